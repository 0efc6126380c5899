use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use serde::Serialize;

use crate::request::DownsampleRequest;
use crate::stage::reformat::ReformatCommand;
use crate::storage::read_file::ReadFile;

/// What a completed invocation did, written next to its outputs
#[derive(Serialize)]
pub struct RunManifest<'a> {
    request: &'a DownsampleRequest,
    tool: &'a Path,
    arguments: Vec<String>,
    outputs: [&'a ReadFile; 2],
    finished_at: String,
}

impl<'a> RunManifest<'a> {
    pub fn new(request: &'a DownsampleRequest, command: &'a ReformatCommand, r1: &'a ReadFile, r2: &'a ReadFile) -> Self {
        RunManifest {
            request,
            tool: &command.tool,
            arguments: command.display_args(),
            outputs: [r1, r2],
            finished_at: Utc::now().to_rfc3339(),
        }
    }

    /// Write the manifest to manifest.json in the working directory
    pub fn write(&self, wd: &Path) -> Result<PathBuf> {
        let manifest = serde_json::to_string_pretty(self).context("Serialise run manifest")?;
        let out_path = wd.join("manifest.json");
        info!("Writing run manifest to {}", out_path.display());
        fs::write(&out_path, manifest).with_context(|| format!("Can't write {}", out_path.display()))?;
        Ok(out_path)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tempfile::tempdir;

    use super::*;
    use crate::request::DownsampleDirective;
    use crate::storage::locator::RemoteRoot;

    #[test]
    fn manifest_records_outputs() {
        let dir = tempdir().unwrap();
        let request = DownsampleRequest::new(
            PathBuf::from("/data/s_R1.fq"),
            PathBuf::from("/data/s_R2.fq"),
            "runA".to_string(),
            DownsampleDirective::TargetFraction(0.5),
        );
        let root = RemoteRoot::parse("s3://bucket").unwrap();
        let r1 = ReadFile::published(dir.path().join("ds_s_R1.fq"), root.locate("runA", "ds_s_R1.fq")).unwrap();
        let r2 = ReadFile::published(dir.path().join("ds_s_R2.fq"), root.locate("runA", "ds_s_R2.fq")).unwrap();
        let command = ReformatCommand {
            tool: PathBuf::from("reformat"),
            in1: request.r1.clone(),
            in2: request.r2.clone(),
            out1: r1.local_path.clone(),
            out2: r2.local_path.clone(),
            directive: request.directive,
        };

        let path = RunManifest::new(&request, &command, &r1, &r2).write(dir.path()).unwrap();
        let json: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(json["request"]["sample_rate"], 0.5);
        assert_eq!(json["arguments"][4], "samplerate=0.5");
        assert_eq!(json["outputs"][1]["remote"], "s3://bucket/downsampled/runA/ds_s_R2.fq");
        assert_eq!(json["outputs"][0]["name"], "ds_s_R1.fq");
    }
}

//! Downsampling requests, from the command line or from JSON messages (launch plans)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::stage::error::StageError;

pub use directive::DownsampleDirective;

/// Read count or sample rate
pub mod directive;
/// Read and validate JSON request messages
pub mod message;
/// Find request messages in a directory
pub mod read;
/// Compile the bundled request schema
pub mod schema;

/// Everything one stage invocation needs
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DownsampleRequest {
    /// Optional label, launch plans use it for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub r1: PathBuf,
    pub r2: PathBuf,
    /// Name of the subdirectory in downsampled/
    pub out_dir: String,
    #[serde(flatten)]
    pub directive: DownsampleDirective,
}

impl DownsampleRequest {
    pub fn new(r1: PathBuf, r2: PathBuf, out_dir: String, directive: DownsampleDirective) -> Self {
        DownsampleRequest { name: None, r1, r2, out_dir, directive }
    }

    /// Checks that don't need the filesystem
    pub fn validate(&self) -> Result<(), StageError> {
        validate_out_dir(&self.out_dir)?;
        self.directive.validate()
    }
}

/// The output directory names a namespace under both the local work root and the remote
/// `downsampled/` prefix, so it must be relative and stay inside it
pub fn validate_out_dir(out_dir: &str) -> Result<(), StageError> {
    if out_dir.is_empty() {
        return Err(StageError::InvalidOutputDirectory {
            out_dir: out_dir.to_string(),
            reason: "out dir can't be empty",
        });
    }
    if out_dir.starts_with('/') {
        return Err(StageError::InvalidOutputDirectory {
            out_dir: out_dir.to_string(),
            reason: "out dir cannot start with a '/'",
        });
    }
    // Path::components drops `.` and repeated separators, so look at the raw segments
    for segment in out_dir.split('/') {
        let reason = match segment {
            "" => "out dir can't contain an empty segment or end with a '/'",
            "." => "out dir can't contain '.'",
            ".." => "out dir can't contain '..'",
            _ => continue,
        };
        return Err(StageError::InvalidOutputDirectory { out_dir: out_dir.to_string(), reason });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn leading_slash_rejected_for_both_directives() {
        for directive in [DownsampleDirective::TargetCount(10), DownsampleDirective::TargetFraction(0.5)] {
            let request = DownsampleRequest::new("a_R1.fq".into(), "a_R2.fq".into(), "/runA".to_string(), directive);
            match request.validate() {
                Err(StageError::InvalidOutputDirectory { out_dir, .. }) => assert_eq!(out_dir, "/runA"),
                other => panic!("expected invalid out dir, got {other:?}"),
            }
        }
    }

    #[test]
    fn out_dir_rules() {
        assert!(validate_out_dir("runA").is_ok());
        assert!(validate_out_dir("project/runA").is_ok());
        assert!(validate_out_dir("").is_err());
        assert!(validate_out_dir("../runA").is_err());
        assert!(validate_out_dir("runA/../../etc").is_err());
    }

    #[test]
    fn out_dir_stays_below_work_root() {
        for out_dir in [".", "./", "a/.", "./runA", "a//b", "runA/"] {
            match validate_out_dir(out_dir) {
                Err(StageError::InvalidOutputDirectory { out_dir: rejected, .. }) => assert_eq!(rejected, out_dir),
                other => panic!("expected {out_dir:?} to be rejected, got {other:?}"),
            }
        }
        assert!(validate_out_dir("runA.v2/.hidden").is_ok());
    }

    #[test]
    fn flattened_directive_round_trip() {
        let json = r#"{"r1": "s_R1.fastq.gz", "r2": "s_R2.fastq.gz", "out_dir": "runA", "out_reads": 1000}"#;
        let request: DownsampleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request,
            DownsampleRequest::new(
                "s_R1.fastq.gz".into(),
                "s_R2.fastq.gz".into(),
                "runA".to_string(),
                DownsampleDirective::TargetCount(1000)
            )
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["out_reads"], 1000);
        assert!(value.get("name").is_none());
    }
}

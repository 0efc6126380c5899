use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

use crate::request::DownsampleDirective;
use crate::stage::error::StageError;

/// Lines of tool stderr kept in a failure report
static STDERR_TAIL: usize = 5;

/// A bbmap reformat invocation over one pair of mates
#[derive(Debug)]
pub struct ReformatCommand {
    pub tool: PathBuf,
    pub in1: PathBuf,
    pub in2: PathBuf,
    pub out1: PathBuf,
    pub out2: PathBuf,
    pub directive: DownsampleDirective,
}

impl ReformatCommand {
    /// Input and output flags, then exactly one sampling control flag
    pub fn args(&self) -> Vec<OsString> {
        vec![
            flag("in1", &self.in1),
            flag("in2", &self.in2),
            flag("out1", &self.out1),
            flag("out2", &self.out2),
            OsString::from(self.directive.reformat_arg()),
        ]
    }

    /// Arguments as text, for logs and the run manifest
    pub fn display_args(&self) -> Vec<String> {
        self.args().iter().map(|arg| arg.to_string_lossy().into_owned()).collect()
    }

    /// Run synchronously in `wd`, failing unless the tool exits 0
    pub fn run(&self, wd: &Path) -> Result<(), StageError> {
        let mut reformat = Command::new(&self.tool);
        let cmd = reformat.args(self.args()).current_dir(wd);
        info!("Running reformat process in {}", wd.display());
        info!("{:?}", &cmd);

        let output = cmd.output().map_err(|err| {
            warn!("Can't start {}: {err}", self.tool.display());
            StageError::ToolInvocationFailed { tool: self.tool.clone(), status: None, detail: err.to_string() }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        // reformat reports its progress and read counts on stderr
        for line in stdout.lines().chain(stderr.lines()) {
            debug!("reformat: {line}");
        }

        match output.status.success() {
            true => Ok(()),
            false => {
                warn!("reformat exited with {}", output.status);
                Err(StageError::ToolInvocationFailed {
                    tool: self.tool.clone(),
                    status: Some(output.status),
                    detail: tail(&stderr, STDERR_TAIL),
                })
            }
        }
    }
}

fn flag(name: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(name);
    arg.push("=");
    arg.push(path);
    arg
}

fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn command(directive: DownsampleDirective) -> ReformatCommand {
        ReformatCommand {
            tool: PathBuf::from("reformat"),
            in1: PathBuf::from("/in/sample_R1.fastq.gz"),
            in2: PathBuf::from("/in/sample_R2.fastq.gz"),
            out1: PathBuf::from("/work/ds_sample_R1.fastq.gz"),
            out2: PathBuf::from("/work/ds_sample_R2.fastq.gz"),
            directive,
        }
    }

    #[test]
    fn count_arguments() {
        assert_eq!(
            command(DownsampleDirective::TargetCount(1000)).display_args(),
            vec![
                "in1=/in/sample_R1.fastq.gz",
                "in2=/in/sample_R2.fastq.gz",
                "out1=/work/ds_sample_R1.fastq.gz",
                "out2=/work/ds_sample_R2.fastq.gz",
                "samplereadstarget=1000",
            ]
        );
    }

    #[test]
    fn fraction_arguments_have_one_control_flag() {
        let args = command(DownsampleDirective::TargetFraction(0.1)).display_args();
        assert_eq!(args.last().map(String::as_str), Some("samplerate=0.1"));
        assert_eq!(args.iter().filter(|a| a.starts_with("sample")).count(), 1);
    }

    #[test]
    fn stderr_tail() {
        assert_eq!(tail("a\nb\n\nc\nd\n", 2), "c | d");
        assert_eq!(tail("", 2), "");
    }
}

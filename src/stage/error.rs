use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

/// Why a downsample stage invocation failed
///
/// Validation errors are raised before the tool is spawned. Nothing is returned to the caller on
/// any failure, so there are no dangling file references.
#[derive(Debug)]
pub enum StageError {
    /// Read count or sample rate out of range
    InvalidDirective(String),
    InvalidOutputDirectory { out_dir: String, reason: &'static str },
    /// Inputs that can't be turned into output names
    InvalidInput(String),
    InputNotReadable { path: PathBuf, source: io::Error },
    WorkingDirectory { path: PathBuf, source: io::Error },
    /// The tool couldn't be started, or exited non-zero
    ToolInvocationFailed { tool: PathBuf, status: Option<ExitStatus>, detail: String },
    /// The tool exited zero but didn't write these outputs
    OutputNotProduced(Vec<PathBuf>),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StageError::InvalidDirective(reason) => write!(f, "invalid directive: {reason}"),
            StageError::InvalidOutputDirectory { out_dir, reason } => {
                write!(f, "invalid out dir {out_dir:?}: {reason}")
            }
            StageError::InvalidInput(reason) => write!(f, "invalid input: {reason}"),
            StageError::InputNotReadable { path, source } => {
                write!(f, "can't read input {}: {source}", path.display())
            }
            StageError::WorkingDirectory { path, source } => {
                write!(f, "can't prepare working directory {}: {source}", path.display())
            }
            StageError::ToolInvocationFailed { tool, status: Some(status), detail } => {
                write!(f, "{} failed ({status}): {detail}", tool.display())
            }
            StageError::ToolInvocationFailed { tool, status: None, detail } => {
                write!(f, "{} couldn't be started: {detail}", tool.display())
            }
            StageError::OutputNotProduced(paths) => {
                let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                write!(f, "expected outputs were not produced: [{}]", paths.join(", "))
            }
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StageError::InputNotReadable { source, .. } | StageError::WorkingDirectory { source, .. } => Some(source),
            _ => None,
        }
    }
}

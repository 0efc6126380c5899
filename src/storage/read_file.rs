use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::storage::locator::RemoteLocator;

/// A sequencing read file (FASTA/FASTQ, maybe compressed)
///
/// Inputs are plain local files. Stage outputs also carry the remote locator they're published to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadFile {
    pub name: String,
    pub local_path: PathBuf,
    pub remote: Option<RemoteLocator>,
}

impl ReadFile {
    /// Wrap a local input file, named by its base name
    pub fn local(path: &Path) -> Option<ReadFile> {
        let name = path.file_name()?.to_str()?.to_string();
        Some(ReadFile { name, local_path: path.to_path_buf(), remote: None })
    }

    pub fn published(local_path: PathBuf, remote: RemoteLocator) -> Option<ReadFile> {
        let name = local_path.file_name()?.to_str()?.to_string();
        Some(ReadFile { name, local_path, remote: Some(remote) })
    }
}

use std::fmt;

use clap::ValueEnum;

use crate::storage::locator::RemoteRoot;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum PlatformNamespace {
    Dev,
    Test,
    Prod,
}

impl PlatformNamespace {
    /// Each namespace publishes to its own bucket unless --remote-root is set
    pub fn default_root(&self) -> RemoteRoot {
        RemoteRoot::parse(&format!("s3://downsample-{self}")).expect("namespace bucket is a valid URL")
    }
}

impl fmt::Display for PlatformNamespace {
    /// Same name the `--namespace` flag accepts
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => Err(fmt::Error),
        }
    }
}

use std::fmt;

use serde::{Serialize, Serializer};
use url::Url;

/// Every output is published under this prefix of the remote root
static DOWNSAMPLED_PREFIX: &str = "downsampled";

/// Remote storage location that outputs are published beneath, e.g. `s3://bucket/prefix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRoot {
    url: Url,
}

impl RemoteRoot {
    pub fn parse(root: &str) -> Result<RemoteRoot, url::ParseError> {
        Ok(RemoteRoot { url: Url::parse(root)? })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Locator for an output file: `<root>/downsampled/<out_dir>/<file_name>`
    ///
    /// `out_dir` is used verbatim, the same name the local working directory is joined from, so it
    /// must already have passed `validate_out_dir`.
    pub fn locate(&self, out_dir: &str, file_name: &str) -> RemoteLocator {
        RemoteLocator {
            root: self.clone(),
            key: format!("{DOWNSAMPLED_PREFIX}/{out_dir}/{file_name}"),
        }
    }
}

impl fmt::Display for RemoteRoot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Where a file ends up once the platform (or `--publish`) uploads it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocator {
    root: RemoteRoot,
    key: String,
}

impl RemoteLocator {
    /// Path relative to the remote root
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn root(&self) -> &RemoteRoot {
        &self.root
    }

    pub fn uri(&self) -> String {
        let root = self.root.url.as_str();
        // a root like latch:/// keeps its empty authority
        let root = root.strip_suffix('/').unwrap_or(root);
        format!("{root}/{}", self.key)
    }

    /// Bucket and object key, for `s3://` roots only
    pub fn s3_object(&self) -> Option<(String, String)> {
        if self.root.url.scheme() != "s3" {
            return None;
        }
        let bucket = self.root.url.host_str().filter(|host| !host.is_empty())?.to_string();
        let prefix = self.root.url.path().trim_matches('/');
        let key = match prefix.is_empty() {
            true => self.key.clone(),
            false => format!("{prefix}/{}", self.key),
        };
        Some((bucket, key))
    }
}

impl fmt::Display for RemoteLocator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

impl Serialize for RemoteLocator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.uri())
    }
}

//! File-backed origin loader used by the node binary.
//!
//! Each value lives in its own file: `{root}/{group}/{key}`.
//!
//! ```text
//!   data/
//!   └── scores/
//!       ├── Tom     "630"
//!       ├── Jack    "589"
//!       └── Sam     "567"
//! ```

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BoxError;
use crate::traits::Loader;

/// Loads values for one group from a directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    dir: PathBuf,
}

impl FileLoader {
    /// Loader for `group` rooted at `root`.
    pub fn new(root: impl AsRef<Path>, group: &str) -> Self {
        Self {
            dir: root.as_ref().join(group),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Keys map to exactly one file directly inside `dir`.
    fn path_for(&self, key: &str) -> Result<PathBuf, BoxError> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.dir.join(name)),
            _ => Err(format!("key {key:?} is not a plain file name").into()),
        }
    }
}

#[async_trait]
impl Loader for FileLoader {
    async fn load(&self, key: &str) -> Result<Bytes, BoxError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(format!("{key} not exist").into())
            },
            Err(err) => Err(Box::new(err)),
        }
    }
}

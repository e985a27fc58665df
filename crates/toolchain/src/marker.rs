//! The version marker file in the working copy.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::ports::MarkerStore;
use pipeline::{MirrorError, Version};

/// [`MarkerStore`] backed by a plain file.
///
/// The file holds the `v`-prefixed version with no trailing newline.
#[derive(Debug, Clone)]
pub struct FileMarker {
    path: PathBuf,
}

impl FileMarker {
    /// `path` is used as given, both for I/O and when staging it in git, so
    /// it should be relative to the working copy.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn error(&self, error: std::io::Error) -> MirrorError {
        MirrorError::Marker {
            path: self.path.display().to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl MarkerStore for FileMarker {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<Option<String>, MirrorError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.error(e)),
        }
    }

    async fn write(&self, version: &Version) -> Result<(), MirrorError> {
        tokio::fs::write(&self.path, version.to_string())
            .await
            .map_err(|e| self.error(e))
    }
}

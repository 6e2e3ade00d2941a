use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for fetching named assets that live under a mosaic's base path.
///
/// The manifest and every tile or sheet file are addressed as
/// `{base_path}/{name}`. Implementations must be thread-safe so fetches can
/// overlap inside a load batch.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the full contents of the asset called `name`.
    async fn fetch(&self, name: &str) -> Result<Bytes, IoError>;

    /// Get a human readable identifier for the base path (for logging).
    fn identifier(&self) -> &str;

    /// Location of `name`, used in log messages and error reports.
    fn locate(&self, name: &str) -> String {
        format!("{}/{}", self.identifier().trim_end_matches('/'), name)
    }
}

/// Asset source backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
    identifier: String,
}

impl FsAssetSource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let identifier = root.display().to_string();
        Self { root, identifier }
    }
}

#[async_trait]
impl AssetSource for FsAssetSource {
    async fn fetch(&self, name: &str) -> Result<Bytes, IoError> {
        let path = self.root.join(name);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(IoError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(IoError::Connection(format!("{}: {}", path.display(), e))),
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

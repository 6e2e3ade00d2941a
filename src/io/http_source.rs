use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use url::Url;

use super::AssetSource;
use crate::error::IoError;

/// HTTP-backed implementation of AssetSource.
///
/// Assets are served as static files at `{base_url}/{name}`. A trailing
/// slash is appended to the base URL so relative names resolve under it
/// rather than replacing its last path segment.
#[derive(Clone)]
pub struct HttpAssetSource {
    client: Client,
    base: Url,
    identifier: String,
}

impl HttpAssetSource {
    /// Create a new HttpAssetSource for the given base URL.
    ///
    /// Returns an error if `base_url` is not an absolute URL.
    pub fn new(client: Client, base_url: &str) -> Result<Self, IoError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| IoError::Connection(format!("invalid base URL {}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let identifier = base.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base,
            identifier,
        })
    }

    /// Resolve the full URL of an asset.
    pub fn url_for(&self, name: &str) -> Result<Url, IoError> {
        self.base
            .join(name)
            .map_err(|e| IoError::Connection(format!("invalid asset name {}: {}", name, e)))
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, name: &str) -> Result<Bytes, IoError> {
        let url = self.url_for(name)?;

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => resp
                .bytes()
                .await
                .map_err(|e| IoError::Connection(e.to_string())),
            StatusCode::NOT_FOUND => Err(IoError::NotFound(url.to_string())),
            status => Err(IoError::Status {
                name: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

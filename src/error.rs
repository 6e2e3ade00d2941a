use thiserror::Error;

/// I/O errors that can occur when fetching assets from the base path
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Asset does not exist under the base path
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Remote answered with a non-success status
    #[error("Unexpected status {status} for {name}")]
    Status { name: String, status: u16 },

    /// Network, connection or filesystem error
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Errors that prevent a mosaic instance from obtaining its layout.
///
/// Both variants are fatal for the instance: no mosaic renders and the
/// plain image fallback is shown instead.
#[derive(Debug, Clone, Error)]
pub enum ManifestError {
    /// The manifest could not be fetched or does not parse into a known shape
    #[error("Manifest unavailable at {path}: {reason}")]
    ManifestUnavailable { path: String, reason: String },

    /// The manifest parsed but describes an impossible layout
    #[error("Invalid manifest: {reason}")]
    Invalid { reason: String },
}

/// Errors local to one tile or sheet load task
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Network or filesystem failure while fetching the asset
    #[error("Failed to fetch {name}: {source}")]
    FetchFailed {
        name: String,
        #[source]
        source: IoError,
    },

    /// Fetched bytes (or a cached payload) are not a decodable image
    #[error("Failed to decode {name}: {message}")]
    DecodeFailed { name: String, message: String },

    /// Re-encoding a decoded tile for cache storage failed
    #[error("Failed to encode tile payload: {message}")]
    EncodeFailed { message: String },
}

/// Errors reported by a persistent [`CacheStore`](crate::tile::CacheStore)
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store refused the write because it is full
    #[error("Store quota exceeded while writing {key}")]
    QuotaExceeded { key: String },

    /// Any other backend failure
    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this failure can be cured by evicting entries.
    pub fn is_quota(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

/// Errors from the tile cache layer.
///
/// These never reach the user: the cache logs and swallows them, since a
/// miss always falls back to a network fetch.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Write failed even after an eviction pass
    #[error("Cache write failed for {key}: {message}")]
    WriteFailed { key: String, message: String },

    /// Stored record or payload could not be parsed
    #[error("Corrupt cache entry: {key}")]
    Corrupt { key: String },
}

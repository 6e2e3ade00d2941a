use tracing::{debug, info, warn};

use crate::error::ManifestError;
use crate::io::AssetSource;

use super::detect::{detect_layout, parse_layout};
use super::model::TileManifest;

/// Default manifest file name under the base path.
pub const DEFAULT_MANIFEST_NAME: &str = "metadata.json";

/// Fetches and validates the tile layout description of one mosaic.
///
/// There is no retry and no partial-manifest mode: any failure is reported
/// as [`ManifestError`] and a full reload is the recovery path.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    manifest_name: String,
}

impl ManifestLoader {
    /// Create a loader for the default manifest name.
    pub fn new() -> Self {
        Self::with_name(DEFAULT_MANIFEST_NAME)
    }

    /// Create a loader that fetches `manifest_name` under the base path.
    pub fn with_name(manifest_name: impl Into<String>) -> Self {
        Self {
            manifest_name: manifest_name.into(),
        }
    }

    /// Fetch, detect, parse and validate the manifest.
    ///
    /// # Errors
    ///
    /// Returns `ManifestUnavailable` if the fetch fails or the payload does
    /// not parse into a known shape, and `Invalid` if the parsed layout
    /// breaks a structural invariant.
    pub async fn load(&self, source: &dyn AssetSource) -> Result<TileManifest, ManifestError> {
        let path = source.locate(&self.manifest_name);
        let unavailable = |reason: String| {
            warn!(path = %path, "Manifest unavailable: {}", reason);
            ManifestError::ManifestUnavailable {
                path: path.clone(),
                reason,
            }
        };

        let bytes = source
            .fetch(&self.manifest_name)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| unavailable(format!("invalid JSON: {}", e)))?;

        let layout = detect_layout(&value)
            .ok_or_else(|| unavailable("unrecognized manifest shape".to_string()))?;
        debug!(path = %path, layout = layout.name(), "Detected manifest layout");

        let manifest = parse_layout(value, layout)
            .map_err(|e| unavailable(format!("malformed {} manifest: {}", layout.name(), e)))?;
        manifest.validate()?;

        info!(
            path = %path,
            layout = layout.name(),
            grid = %format!("{}x{}", manifest.canvas_width, manifest.canvas_height),
            tiles = manifest.tiles.len(),
            sheets = manifest.sheets.len(),
            "Loaded manifest"
        );

        Ok(manifest)
    }
}

impl Default for ManifestLoader {
    fn default() -> Self {
        Self::new()
    }
}

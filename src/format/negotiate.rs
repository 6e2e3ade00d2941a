//! Compact-format negotiation.
//!
//! Tiles and sheets may be published twice: once in a compact encoding
//! (WebP) and once in a universal one (PNG). On first use the runtime is
//! detected by encoding a 1×1 image in the compact format; the answer is
//! cached for the lifetime of the process.

use std::sync::OnceLock;

use image::codecs::webp::WebPEncoder;
use image::ExtendedColorType;
use tracing::{debug, info};

use crate::manifest::AssetName;

static COMPACT_SUPPORT: OnceLock<bool> = OnceLock::new();

/// Check whether bytes carry a WebP (RIFF/WEBP) signature.
pub fn is_compact_payload(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

/// Check (once per process) whether the compact format can be produced.
pub fn detect_compact_support() -> bool {
    *COMPACT_SUPPORT.get_or_init(|| {
        let mut out = Vec::new();
        let encoded = WebPEncoder::new_lossless(&mut out)
            .encode(&[0, 0, 0, 0], 1, 1, ExtendedColorType::Rgba8)
            .is_ok();
        let supported = encoded && is_compact_payload(&out);
        debug!(supported, "Detected compact tile format support");
        supported
    })
}

// =============================================================================
// Resolution
// =============================================================================

/// File names to try for one asset, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// The name to request first; also the cache key
    pub primary: String,

    /// Name tried once if the primary fails to fetch or decode
    pub alternate: Option<String>,
}

/// Resolves asset file names against the runtime's format support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatNegotiator {
    supports_compact: bool,
}

impl FormatNegotiator {
    /// Create a negotiator from the process-wide support check.
    pub fn detect() -> Self {
        let supports_compact = detect_compact_support();
        if !supports_compact {
            info!("Compact tile format unsupported, resolving universal file names");
        }
        Self { supports_compact }
    }

    /// Create a negotiator with a fixed answer (configuration override, tests).
    pub fn with_support(supports_compact: bool) -> Self {
        Self { supports_compact }
    }

    /// Whether compact file names are preferred.
    pub fn supports_compact(&self) -> bool {
        self.supports_compact
    }

    /// Pick the file name to request for `asset`.
    ///
    /// The compact name wins when supported and present; the universal name
    /// becomes its single fallback. Without support, only the universal
    /// name is ever used.
    pub fn resolve(&self, asset: &AssetName) -> ResolvedAsset {
        match (&asset.compact, self.supports_compact) {
            (Some(compact), true) if compact != &asset.universal => ResolvedAsset {
                primary: compact.clone(),
                alternate: Some(asset.universal.clone()),
            },
            _ => ResolvedAsset {
                primary: asset.universal.clone(),
                alternate: None,
            },
        }
    }
}

impl Default for FormatNegotiator {
    fn default() -> Self {
        Self::detect()
    }
}

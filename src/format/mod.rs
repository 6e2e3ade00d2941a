//! Raster format negotiation.
//!
//! Use [`FormatNegotiator`] to turn a manifest [`AssetName`](crate::manifest::AssetName)
//! into the file name to request plus its single fallback. Two encodings are
//! supported:
//!
//! - **Compact** (WebP): preferred when the runtime can produce it
//! - **Universal** (PNG): always available

pub mod negotiate;

pub use negotiate::{is_compact_payload, detect_compact_support, FormatNegotiator, ResolvedAsset};

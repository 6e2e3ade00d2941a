//! Manifest loading.
//!
//! A manifest maps every cell of the mosaic's tile grid to the file (or the
//! region of a packed sheet) holding its pixels. Use [`ManifestLoader`] to
//! fetch one from a base path; the shape is detected from the JSON content
//! by [`detect_layout`].

mod detect;
mod loader;
mod model;

pub use detect::{detect_layout, parse_layout};
pub use loader::{ManifestLoader, DEFAULT_MANIFEST_NAME};
pub use model::{
    AssetName, GridPos, ManifestLayout, SheetDescriptor, SourceLocator, TileDescriptor,
    TileManifest,
};

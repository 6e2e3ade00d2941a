mod asset_source;
mod http_source;

pub use asset_source::{AssetSource, FsAssetSource};
pub use http_source::HttpAssetSource;

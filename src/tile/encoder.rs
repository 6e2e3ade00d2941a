//! Tile payload codec.
//!
//! This module handles decoding fetched tile and sheet files into RGBA
//! bitmaps, and re-encoding decoded tiles into self-contained cache payloads.
//!
//! # Design Decisions
//!
//! - **Sniff, don't trust names**: the compact and universal variants of an
//!   asset are decoded by content, so a mislabelled file still decodes.
//!
//! - **Always PNG in the cache**: payloads are re-encoded losslessly as PNG
//!   regardless of the fetched encoding, then hex-encoded so they fit in a
//!   string-valued store.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, RgbaImage};

use crate::error::TileError;

/// Stateless decoder/encoder for tile images and cache payloads.
#[derive(Debug, Clone, Default)]
pub struct TileCodec {}

impl TileCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self {}
    }

    /// Decode a fetched file into an RGBA bitmap.
    ///
    /// # Errors
    ///
    /// Returns `DecodeFailed` if the format cannot be recognised or the data
    /// is corrupt.
    pub fn decode(&self, name: &str, source: &[u8]) -> Result<RgbaImage, TileError> {
        let decode_failed = |message: String| TileError::DecodeFailed {
            name: name.to_string(),
            message,
        };

        let reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| decode_failed(e.to_string()))?;

        if reader.format().is_none() {
            return Err(decode_failed("unrecognized image format".to_string()));
        }

        let img = reader.decode().map_err(|e| decode_failed(e.to_string()))?;
        Ok(img.to_rgba8())
    }

    /// Re-encode a decoded bitmap into a cache payload.
    pub fn encode_payload(&self, image: &RgbaImage) -> Result<String, TileError> {
        let mut output = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .map_err(|e| TileError::EncodeFailed {
                message: e.to_string(),
            })?;

        Ok(hex::encode(output))
    }

    /// Decode a cache payload produced by [`encode_payload`](Self::encode_payload).
    pub fn decode_payload(&self, key: &str, payload: &str) -> Result<RgbaImage, TileError> {
        let bytes = hex::decode(payload).map_err(|e| TileError::DecodeFailed {
            name: key.to_string(),
            message: format!("invalid payload encoding: {}", e),
        })?;
        self.decode(key, &bytes)
    }
}

//! Pyramid tile compression.
//!
//! Each output tile is one channel plane of `edge × edge` samples. Edge tiles
//! are zero-padded to the full tile size before compression, so every tile a
//! reader decodes has the same dimensions.
//!
//! # Codecs
//!
//! - **none**: little-endian `u16` samples as-is
//! - **zlib**: the same bytes in a zlib stream (TIFF "Adobe Deflate")
//! - **lzma**: the same bytes in an xz container (LZMA2, preset 6)
//! - **jpeg**: a self-contained 8-bit grayscale baseline JPEG; samples above
//!   255 saturate

use std::io::Write;

use bytes::Bytes;
use flate2::write::ZlibEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use ndarray::ArrayView2;
use xz2::write::XzEncoder;

use crate::error::EncodeError;
use crate::format::tiff::Compression;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// xz preset used for LZMA tiles.
const XZ_PRESET: u32 = 6;

// =============================================================================
// Tile Encoder
// =============================================================================

/// Compresses single-channel tiles for one compression scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileEncoder {
    compression: Compression,
    jpeg_quality: u8,
}

impl TileEncoder {
    /// Create an encoder. Out-of-range JPEG quality is clamped.
    pub fn new(compression: Compression, jpeg_quality: u8) -> Self {
        Self {
            compression,
            jpeg_quality: clamp_quality(jpeg_quality),
        }
    }

    /// Compression scheme this encoder produces.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Compress one tile.
    ///
    /// `samples` is the in-bounds part of the tile and may be smaller than
    /// `edge` in either direction; the remainder is zero-filled.
    pub fn encode(&self, samples: ArrayView2<'_, u16>, edge: usize) -> Result<Bytes, EncodeError> {
        let (rows, cols) = samples.dim();
        if rows > edge || cols > edge {
            return Err(EncodeError::Compression {
                codec: self.compression.name(),
                message: format!("{cols}x{rows} samples do not fit a {edge}px tile"),
            });
        }

        match self.compression {
            Compression::Jpeg => self.encode_jpeg(samples, edge),
            Compression::AdobeDeflate => {
                let raw = padded_u16_le(samples, edge);
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&raw).map_err(|e| self.codec_error(e))?;
                let compressed = encoder.finish().map_err(|e| self.codec_error(e))?;
                Ok(Bytes::from(compressed))
            }
            Compression::Lzma => {
                let raw = padded_u16_le(samples, edge);
                let mut encoder = XzEncoder::new(Vec::new(), XZ_PRESET);
                encoder.write_all(&raw).map_err(|e| self.codec_error(e))?;
                let compressed = encoder.finish().map_err(|e| self.codec_error(e))?;
                Ok(Bytes::from(compressed))
            }
            Compression::None => Ok(Bytes::from(padded_u16_le(samples, edge))),
        }
    }

    fn encode_jpeg(&self, samples: ArrayView2<'_, u16>, edge: usize) -> Result<Bytes, EncodeError> {
        let mut pixels = vec![0u8; edge * edge];
        for ((row, col), &value) in samples.indexed_iter() {
            pixels[row * edge + col] = value.min(u8::MAX as u16) as u8;
        }

        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, self.jpeg_quality);
        encoder
            .encode(&pixels, edge as u32, edge as u32, ExtendedColorType::L8)
            .map_err(|e| self.codec_error(e))?;

        Ok(Bytes::from(output))
    }

    fn codec_error(&self, err: impl std::fmt::Display) -> EncodeError {
        EncodeError::Compression {
            codec: self.compression.name(),
            message: err.to_string(),
        }
    }
}

/// Lay out samples row-major in an `edge × edge` little-endian buffer.
fn padded_u16_le(samples: ArrayView2<'_, u16>, edge: usize) -> Vec<u8> {
    let mut raw = vec![0u8; edge * edge * 2];
    for ((row, col), &value) in samples.indexed_iter() {
        let at = (row * edge + col) * 2;
        raw[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }
    raw
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================

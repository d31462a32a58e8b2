//! Configuration management for slide-mosaic.
//!
//! Options come from the command line via clap; every option can also be set
//! through an environment variable with the `MOSAIC_` prefix.
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use slide_mosaic::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Stitching {} into {}", config.folder.display(), config.output.display());
//! ```
//!
//! # Environment Variables
//!
//! - `MOSAIC_FOLDER` - Folder holding the tile files (required)
//! - `MOSAIC_OUTPUT` - Output OME-TIFF path (required)
//! - `MOSAIC_PATTERN` - File name filter, `*` matches anything
//! - `MOSAIC_CHANNELS` - Canvas channel count (default: 6)
//! - `MOSAIC_CHANNEL_NAMES` - Comma-separated channel names
//! - `MOSAIC_COMPRESSION` - zlib, lzma, jpeg or none (default: zlib)
//! - `MOSAIC_TILE_SIZE` - Output tile edge in pixels (default: 512)
//! - `MOSAIC_MARGIN` - Empty border around the mosaic (default: 20)
//! - `MOSAIC_JPEG_QUALITY` - JPEG quality (default: 90)

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::format::tiff::Compression;
use crate::mosaic::{
    DEFAULT_CHANNEL_NAMES, DEFAULT_MARGIN, DEFAULT_MAX_TILE_CHANNELS, DEFAULT_TILE_SIZE,
    TILE_SIZE_MULTIPLE,
};
use crate::tile::{is_valid_quality, DEFAULT_JPEG_QUALITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of canvas channels.
pub const DEFAULT_CHANNELS: usize = 6;

/// Upper bound for the canvas channel count.
pub const MAX_CHANNELS: usize = 256;

// =============================================================================
// Compression Choice
// =============================================================================

/// Tile compression offered on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompressionKind {
    Zlib,
    Lzma,
    Jpeg,
    None,
}

impl CompressionKind {
    pub fn compression(self) -> Compression {
        match self {
            CompressionKind::Zlib => Compression::AdobeDeflate,
            CompressionKind::Lzma => Compression::Lzma,
            CompressionKind::Jpeg => Compression::Jpeg,
            CompressionKind::None => Compression::None,
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// slide-mosaic - Stitch coordinate-named tiles into a pyramidal OME-TIFF.
///
/// Every `.tif`/`.tiff` file in the folder whose name carries an `[x,y]`
/// placement is composited onto one canvas, which is written as a tiled,
/// multi-resolution BigTIFF with per-channel OME metadata.
#[derive(Parser, Debug, Clone)]
#[command(name = "slide-mosaic")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Input / Output
    // =========================================================================
    /// Folder containing the tile files.
    #[arg(long, env = "MOSAIC_FOLDER")]
    pub folder: PathBuf,

    /// Path of the OME-TIFF to write.
    #[arg(short, long, env = "MOSAIC_OUTPUT")]
    pub output: PathBuf,

    /// Only use files whose name contains this text (`*` matches anything).
    #[arg(long, env = "MOSAIC_PATTERN")]
    pub pattern: Option<String>,

    /// Write a JSON run report to this path.
    #[arg(long, env = "MOSAIC_REPORT")]
    pub report: Option<PathBuf>,

    // =========================================================================
    // Channels
    // =========================================================================
    /// Number of channels in the output.
    #[arg(long, default_value_t = DEFAULT_CHANNELS, env = "MOSAIC_CHANNELS")]
    pub channels: usize,

    /// Channel names in canvas order (comma-separated).
    ///
    /// Channels without a name are called "Channel N".
    #[arg(
        long,
        num_args = 1..,
        value_delimiter = ',',
        default_values_t = DEFAULT_CHANNEL_NAMES.map(String::from),
        env = "MOSAIC_CHANNEL_NAMES"
    )]
    pub channel_names: Vec<String>,

    /// JSON file replacing the built-in channel metadata table.
    #[arg(long, env = "MOSAIC_CHANNEL_TABLE")]
    pub channel_table: Option<PathBuf>,

    /// JSON file with a precomputed unmixing matrix to apply.
    #[arg(long, env = "MOSAIC_UNMIXING_MATRIX", conflicts_with = "subtract_autofluorescence")]
    pub unmixing_matrix: Option<PathBuf>,

    /// Subtract this multiple of the "Sample AF" channel from every other channel.
    #[arg(long, env = "MOSAIC_SUBTRACT_AUTOFLUORESCENCE")]
    pub subtract_autofluorescence: Option<f64>,

    // =========================================================================
    // Tiles
    // =========================================================================
    /// Empty border in pixels right of and below the mosaic.
    #[arg(long, default_value_t = DEFAULT_MARGIN, env = "MOSAIC_MARGIN")]
    pub margin: usize,

    /// Channels kept from input tiles that carry more.
    #[arg(long, default_value_t = DEFAULT_MAX_TILE_CHANNELS, env = "MOSAIC_MAX_TILE_CHANNELS")]
    pub max_tile_channels: usize,

    /// Do not unstack Akoya component_data band layouts.
    #[arg(long, default_value_t = false, env = "MOSAIC_NO_PRODUCER_QUIRKS")]
    pub no_producer_quirks: bool,

    // =========================================================================
    // Encoding
    // =========================================================================
    /// Tile compression.
    #[arg(long, value_enum, default_value_t = CompressionKind::Zlib, env = "MOSAIC_COMPRESSION")]
    pub compression: CompressionKind,

    /// Output tile edge in pixels (multiple of 16).
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "MOSAIC_TILE_SIZE")]
    pub tile_size: usize,

    /// JPEG quality (1-100), used with --compression jpeg.
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "MOSAIC_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.folder.as_os_str().is_empty() {
            return Err("Tile folder is required. Set --folder or MOSAIC_FOLDER".to_string());
        }
        if self.output.as_os_str().is_empty() {
            return Err("Output path is required. Set --output or MOSAIC_OUTPUT".to_string());
        }

        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(format!("channels must be between 1 and {MAX_CHANNELS}"));
        }
        if self.max_tile_channels == 0 {
            return Err("max_tile_channels must be greater than 0".to_string());
        }

        if self.tile_size == 0 || self.tile_size % TILE_SIZE_MULTIPLE != 0 {
            return Err(format!(
                "tile_size must be a positive multiple of {TILE_SIZE_MULTIPLE}"
            ));
        }

        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if let Some(coefficient) = self.subtract_autofluorescence {
            if !coefficient.is_finite() || coefficient < 0.0 {
                return Err(
                    "subtract_autofluorescence must be a non-negative number".to_string(),
                );
            }
            if self.unmixing_matrix.is_some() {
                return Err(
                    "subtract_autofluorescence and unmixing_matrix cannot be combined"
                        .to_string(),
                );
            }
        }

        if self.margin == 0 {
            return Err("margin must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Compression scheme for the output tiles.
    pub fn compression(&self) -> Compression {
        self.compression.compression()
    }
}

// =============================================================================
// Tests
// =============================================================================

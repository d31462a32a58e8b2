//! Output tile compression.
//!
//! The pyramid writer cuts every level into square tiles, one channel plane at
//! a time, and hands each tile to a [`TileEncoder`] configured for the run's
//! compression scheme.
//!
//! ```text
//! level (H, W, C) ──► plane c ──► tile (ty, tx) ──► TileEncoder ──► bytes
//! ```

mod encoder;

pub use encoder::{
    clamp_quality, is_valid_quality, TileEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};

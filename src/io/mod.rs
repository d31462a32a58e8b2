//! Tile input.
//!
//! Tiles are read through the [`TileSource`] trait; [`TiffTileSource`] reads
//! local TIFF files.

mod source;

pub use source::{
    list_tile_files, DecodedTile, SampleType, TiffTileSource, TileSamples, TileShape, TileSource,
};

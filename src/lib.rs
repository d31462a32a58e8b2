//! # slide-mosaic
//!
//! Stitches microscopy tiles whose file names carry their placement
//! (`slide_[1024,2048]_component_data.tif`) into one canvas and writes it as a
//! tiled, multi-resolution BigTIFF with OME-XML channel metadata.
//!
//! ## Features
//!
//! - **Coordinate-named tiles**: placement parsed from the `[x,y]` in each file name
//! - **Metadata-only analysis**: tile shapes are read from the TIFF directory chain
//! - **Producer quirks**: Akoya `component_data` band stacks are unstacked into channels
//! - **Point-sampled pyramid**: halving down to 256 px, reproducible sample for sample
//! - **OME-TIFF output**: BigTIFF, separate planes, zlib/LZMA/JPEG/uncompressed tiles
//! - **Channel metadata**: colour, fluorophore and wavelengths per channel
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - Tile decode interface and local TIFF source
//! - [`mod@format`] - TIFF parser, BigTIFF writer and OME-XML
//! - [`tile`] - Per-tile compression
//! - [`mosaic`] - Inventory, compositing, pyramid, channels and the run pipeline
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use slide_mosaic::{MosaicJob, ProducerQuirk, RunContext, TiffTileSource};
//!
//! let job = MosaicJob::new("/data/tiles", "/data/mosaic.ome.tif");
//! let source = TiffTileSource::new().with_quirk(ProducerQuirk::akoya_component_data());
//! let mut ctx = RunContext::new("/data/tiles");
//!
//! match job.run(&mut ctx, &source) {
//!     Ok(outcome) => println!("{:?}, {} tile(s) placed", outcome, ctx.report().tiles_placed),
//!     Err(e) => eprintln!("mosaic failed: {e}"),
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod mosaic;
pub mod tile;

// Re-export commonly used types
pub use config::{CompressionKind, Config};
pub use error::{EncodeError, MosaicError, TiffError, TileError};
pub use format::tiff::{
    BigTiffWriter, ByteOrder, Compression, Ifd, IfdBuilder, IfdEntry, TiffFile, TiffHeader,
    TiffPyramid, TiffTag,
};
pub use format::{ome_xml, OmeImage};
pub use io::{list_tile_files, DecodedTile, TiffTileSource, TileSamples, TileShape, TileSource};
pub use mosaic::{
    parse_coordinates, resolve_channel, Canvas, ChannelDescriptor, ChannelTable, Compositor,
    EncodingOptions, Inventory, MosaicJob, MosaicOutput, ProducerQuirk, Pyramid, RunContext,
    RunOutcome, RunReport, TileNormalizer, UnmixingMatrix,
};
pub use tile::TileEncoder;

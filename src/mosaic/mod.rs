//! Tile mosaic pipeline.
//!
//! This module provides:
//! - [`coords`]: `[x,y]` placement parsing from tile names
//! - [`inventory`]: file filtering and metadata-only tile analysis
//! - [`normalize`]: `(height, width, channel)` layout and producer quirks
//! - [`canvas`]: canvas allocation and last-write-wins compositing
//! - [`pyramid`]: point-sampled resolution pyramid
//! - [`channels`]: channel name to display/fluorophore metadata
//! - [`unmix`]: precomputed linear channel unmixing
//! - [`output`]: pyramidal OME-TIFF writer
//! - [`pipeline`]: the end-to-end run
//! - [`context`]: per-run logging span and report

pub mod canvas;
pub mod channels;
pub mod context;
pub mod coords;
pub mod inventory;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod pyramid;
pub mod unmix;

pub use canvas::{
    Canvas, ChannelCopy, ChannelSkipReason, Compositor, Placement, DEFAULT_MARGIN,
};
pub use channels::{
    channel_names, resolve_channel, resolve_channels, ChannelColor, ChannelDescriptor,
    ChannelInfo, ChannelTable, DEFAULT_CHANNEL_NAMES,
};
pub use context::{ChannelSkip, LevelSummary, RunContext, RunReport, TileSkip};
pub use coords::parse_coordinates;
pub use inventory::{tile_name, Inventory, NameFilter, TileRecord};
pub use normalize::{
    ProducerQuirk, QuirkTransform, TileNormalizer, DEFAULT_BAND_HEIGHT, DEFAULT_MAX_TILE_CHANNELS,
};
pub use output::{
    EncodingOptions, MosaicOutput, DEFAULT_TILE_SIZE, IMAGE_NAME, TILE_SIZE_MULTIPLE,
};
pub use pipeline::{MosaicJob, RunOutcome, AUTOFLUORESCENCE_CHANNEL};
pub use pyramid::{downsample, Pyramid, PyramidLevel, MIN_PYRAMID_DIMENSION};
pub use unmix::UnmixingMatrix;

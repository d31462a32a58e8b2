use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

impl From<std::io::Error> for TiffError {
    fn from(err: std::io::Error) -> Self {
        TiffError::Io(err.to_string())
    }
}

/// Per-tile failures.
///
/// None of these abort a run: the tile is logged, recorded in the run report
/// and left off the canvas.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// File name carries no `[x,y]` placement
    #[error("no [x,y] coordinates in file name '{name}'")]
    NoCoordinates { name: String },

    /// Width, height or channel count could not be determined
    #[error("could not read dimensions of {}: {message}", .path.display())]
    Probe { path: PathBuf, message: String },

    /// Pixel data could not be decoded
    #[error("could not decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },

    /// Decoded buffer has a sample type or layout the canvas cannot take
    #[error("unsupported sample layout in {}: {message}", .path.display())]
    UnsupportedLayout { path: PathBuf, message: String },

    /// Tile rectangle does not intersect the canvas
    #[error(
        "tile at ({x},{y}) size {width}x{height} falls outside the {canvas_width}x{canvas_height} canvas"
    )]
    OutsideCanvas {
        x: u32,
        y: u32,
        width: usize,
        height: usize,
        canvas_width: usize,
        canvas_height: usize,
    },
}

impl TileError {
    /// Short machine-readable label for the report.
    pub const fn kind(&self) -> &'static str {
        match self {
            TileError::NoCoordinates { .. } => "no_coordinates",
            TileError::Probe { .. } => "probe",
            TileError::Decode { .. } => "decode",
            TileError::UnsupportedLayout { .. } => "unsupported_layout",
            TileError::OutsideCanvas { .. } => "outside_canvas",
        }
    }
}

/// Errors raised while serializing the pyramid.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Underlying writer failed
    #[error("I/O error while writing: {0}")]
    Io(#[from] std::io::Error),

    /// A tile could not be compressed
    #[error("{codec} compression failed: {message}")]
    Compression { codec: &'static str, message: String },

    /// Level cannot be represented in the container
    #[error("cannot encode level {level}: {message}")]
    InvalidLevel { level: usize, message: String },

    /// Written file failed the structural read-back check
    #[error("written file failed verification: {0}")]
    Verification(#[from] TiffError),
}

/// Run-level failures. Any of these aborts the run without leaving an output file.
#[derive(Debug, Error)]
pub enum MosaicError {
    /// Invalid option combination
    #[error("configuration error: {0}")]
    Config(String),

    /// Tile folder could not be listed
    #[error("cannot read tile folder {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Output file could not be created
    #[error("cannot create output file {}: {source}", .path.display())]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Canvas extent cannot be allocated on this platform
    #[error("canvas of {width}x{height} with {channels} channel(s) is too large")]
    CanvasTooLarge {
        width: u64,
        height: u64,
        channels: usize,
    },

    /// Pyramid encoding failed part-way
    #[error("failed to write {}: {source}", .path.display())]
    Encode { path: PathBuf, source: EncodeError },

    /// Channel metadata table could not be loaded
    #[error("invalid channel table {}: {message}", .path.display())]
    ChannelTable { path: PathBuf, message: String },

    /// Unmixing matrix could not be loaded or does not fit the canvas
    #[error("invalid unmixing matrix: {0}")]
    UnmixingMatrix(String),

    /// Run report could not be written
    #[error("cannot write run report {}: {message}", .path.display())]
    Report { path: PathBuf, message: String },
}

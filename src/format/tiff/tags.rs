//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary shared by the reader and the pyramid writer:
//! - Field types that determine how values are encoded
//! - Tag IDs that identify metadata fields
//! - Compression scheme codes
//!
//! The definitions support both classic TIFF and BigTIFF formats.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Only the types that tile files and OME-TIFF pyramids actually use are
/// defined here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer (1 byte)
    Byte = 1,

    /// 8-bit ASCII character (1 byte)
    Ascii = 2,

    /// Unsigned 16-bit integer (2 bytes)
    Short = 3,

    /// Unsigned 32-bit integer (4 bytes)
    Long = 4,

    /// Two Longs: numerator then denominator (8 bytes)
    Rational = 5,

    /// Unsigned 64-bit integer (8 bytes) - BigTIFF only
    Long8 = 16,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unsupported or unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            16 => Some(FieldType::Long8),
            _ => None,
        }
    }

    /// Check if a value with this type and count fits inline in an IFD entry
    /// (4 bytes classic, 8 bytes BigTIFF).
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff { 8 } else { 4 };
        (self.size_in_bytes() as u64)
            .checked_mul(count)
            .is_some_and(|total| total <= threshold)
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs written to the pyramid and looked up when reading it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    /// Marks reduced-resolution copies (bit 0 = reduced image)
    NewSubfileType = 254,

    /// Image width in pixels
    ImageWidth = 256,

    /// Image height (length) in pixels
    ImageLength = 257,

    /// Bits per sample, one value per sample
    BitsPerSample = 258,

    /// Compression scheme used
    Compression = 259,

    /// Photometric interpretation (MinIsBlack for fluorescence channels)
    PhotometricInterpretation = 262,

    /// Description string (carries the OME-XML document on the first page)
    ImageDescription = 270,

    /// Number of components per pixel
    SamplesPerPixel = 277,

    /// How components are organized (chunky vs planar)
    PlanarConfiguration = 284,

    /// Name of the writing program
    Software = 305,

    // -------------------------------------------------------------------------
    // Tile Organization
    // -------------------------------------------------------------------------
    /// Width of each tile in pixels
    TileWidth = 322,

    /// Height (length) of each tile in pixels
    TileLength = 323,

    /// Byte offsets of each tile in the file
    TileOffsets = 324,

    /// Byte counts of each tile
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // Sample Interpretation
    // -------------------------------------------------------------------------
    /// Meaning of samples beyond the photometric ones
    ExtraSamples = 338,

    /// Unsigned / signed / float per sample
    SampleFormat = 339,

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------
    /// Pixels per unit in X direction
    XResolution = 282,

    /// Pixels per unit in Y direction
    YResolution = 283,

    /// Unit of resolution (1=none, 2=inch, 3=centimeter)
    ResolutionUnit = 296,
}

impl TiffTag {
    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// `NewSubfileType` bit marking a reduced-resolution version of another image.
pub const SUBFILE_REDUCED_IMAGE: u32 = 1;

/// `PhotometricInterpretation` value for single-band intensity data.
pub const PHOTOMETRIC_MIN_IS_BLACK: u16 = 1;

/// `PlanarConfiguration` value for one plane per sample.
pub const PLANAR_SEPARATE: u16 = 2;

/// `ResolutionUnit` value for "no absolute unit".
pub const RESOLUTION_UNIT_NONE: u16 = 1;

/// `SampleFormat` value for unsigned integers.
pub const SAMPLE_FORMAT_UINT: u16 = 1;

/// `ExtraSamples` value for samples with no defined meaning.
pub const EXTRA_SAMPLE_UNSPECIFIED: u16 = 0;

// =============================================================================
// Compression Values
// =============================================================================

/// Compression schemes the pyramid writer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    /// No compression
    None = 1,

    /// JPEG compression, one self-contained stream per tile
    Jpeg = 7,

    /// zlib stream ("Adobe Deflate")
    AdobeDeflate = 8,

    /// xz/LZMA2 stream
    Lzma = 34925,
}

impl Compression {
    /// Get the numeric code.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Bits per written sample under this scheme.
    ///
    /// Baseline JPEG only carries 8-bit samples.
    #[inline]
    pub const fn bits_per_sample(self) -> u16 {
        match self {
            Compression::Jpeg => 8,
            _ => 16,
        }
    }

    /// Get a human-readable name for the compression scheme.
    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Jpeg => "JPEG",
            Compression::AdobeDeflate => "zlib",
            Compression::Lzma => "LZMA",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

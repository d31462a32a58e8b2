//! TIFF and BigTIFF container handling.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read respecting this order.
//!
//! - **Classic TIFF vs BigTIFF**: Classic TIFF uses 32-bit offsets (max 4GB files),
//!   while BigTIFF uses 64-bit offsets. The reader handles both; the writer only
//!   produces little-endian BigTIFF.
//!
//! - **IFD (Image File Directory)**: Contains metadata and pointers to image data.
//!   A written mosaic has one IFD per pyramid level.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod parser;
mod pyramid;
mod tags;
mod values;
mod writer;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffFile, TiffHeader};
pub use pyramid::{PyramidLevel, TiffPyramid};
pub use tags::{
    Compression, FieldType, TiffTag, EXTRA_SAMPLE_UNSPECIFIED, PHOTOMETRIC_MIN_IS_BLACK,
    PLANAR_SEPARATE, RESOLUTION_UNIT_NONE, SAMPLE_FORMAT_UINT, SUBFILE_REDUCED_IMAGE,
};
pub use values::ValueReader;
pub use writer::{BigTiffWriter, IfdBuilder};

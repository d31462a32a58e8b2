//! TIFF header and IFD parsing.
//!
//! Parsing is metadata-only: the header and the IFD chain are read, pixel data
//! never is. Entry counts and value sizes come from the file and are checked
//! before anything is allocated. The post-write check of the pyramid uses it.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::TiffError;

use super::tags::{FieldType, TiffTag};
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
pub(super) const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub(super) const BIGTIFF_HEADER_SIZE: usize = 16;

/// Upper bound on IFDs followed in one file
const MAX_IFDS: usize = 4096;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from the start of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 2 bytes.
    #[inline]
    pub(crate) fn read_u16(self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    /// Read a u32 from the start of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 4 bytes.
    #[inline]
    pub(crate) fn read_u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    /// Read a u64 from the start of `bytes`.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 8 bytes.
    #[inline]
    pub(crate) fn read_u64(self, bytes: &[u8]) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes[..8]);
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(raw),
            ByteOrder::BigEndian => u64::from_be_bytes(raw),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// `file_size` is used to reject a first IFD offset that points past the end.
    ///
    /// # Errors
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 or 43
    /// - `InvalidBigTiffOffsetSize` if BigTIFF offset size is not 8
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        let (is_bigtiff, first_ifd_offset) = match version {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            _ => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Size of an IFD entry in bytes (12 classic, 20 BigTIFF).
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD (2 classic, 8 BigTIFF).
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the value/offset field in an IFD entry (4 classic, 8 BigTIFF).
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One tag entry of an IFD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    /// Raw tag code
    pub tag: u16,

    /// Field type, if known
    pub field_type: Option<FieldType>,

    /// Raw field type code
    pub field_type_raw: u16,

    /// Number of values
    pub count: u64,

    /// The value/offset field exactly as stored (zero-padded to 8 bytes)
    pub value_offset_bytes: [u8; 8],

    /// Whether the value is stored inline in `value_offset_bytes`
    pub is_inline: bool,

    /// File offset of the value when not inline
    pub value_offset: u64,
}

impl IfdEntry {
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let byte_order = header.byte_order;
        let tag = byte_order.read_u16(&bytes[0..2]);
        let field_type_raw = byte_order.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_start) = if header.is_bigtiff {
            (byte_order.read_u64(&bytes[4..12]), 12)
        } else {
            (byte_order.read_u32(&bytes[4..8]) as u64, 8)
        };

        let value_size = header.value_offset_size();
        let mut value_offset_bytes = [0u8; 8];
        value_offset_bytes[..value_size].copy_from_slice(&bytes[value_start..value_start + value_size]);

        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, header.is_bigtiff))
            .unwrap_or(false);

        let value_offset = if header.is_bigtiff {
            byte_order.read_u64(&value_offset_bytes)
        } else {
            byte_order.read_u32(&value_offset_bytes) as u64
        };

        IfdEntry {
            tag,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes,
            is_inline,
            value_offset,
        }
    }

    /// Total size of the value in bytes.
    ///
    /// `None` if the field type is unknown or the count overflows.
    pub fn value_byte_size(&self) -> Option<u64> {
        (self.field_type?.size_in_bytes() as u64).checked_mul(self.count)
    }

    /// Single Short/Long value stored inline.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// File offset this IFD was read from
    pub offset: u64,

    /// Entries in file order
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD (0 terminates the chain)
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Total byte size of an IFD with `entry_count` entries.
    ///
    /// Fails when the size does not fit in memory addressing.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> Result<usize, TiffError> {
        usize::try_from(entry_count)
            .ok()
            .and_then(|count| count.checked_mul(header.ifd_entry_size()))
            .and_then(|entries| {
                entries.checked_add(header.ifd_count_size() + header.value_offset_size())
            })
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "IFD",
                message: format!("entry count {entry_count} is too large"),
            })
    }

    /// Parse an IFD from bytes starting at its entry count.
    pub fn parse(bytes: &[u8], offset: u64, header: &TiffHeader) -> Result<Self, TiffError> {
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let byte_order = header.byte_order;
        let entry_count = if header.is_bigtiff {
            byte_order.read_u64(bytes)
        } else {
            byte_order.read_u16(bytes) as u64
        };

        let required = Self::calculate_size(entry_count, header)?;
        if bytes.len() < required {
            return Err(TiffError::FileTooSmall {
                required: required as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let entries = (0..entry_count as usize)
            .map(|i| {
                let start = count_size + i * entry_size;
                IfdEntry::parse(&bytes[start..start + entry_size], header)
            })
            .collect();

        let next_start = count_size + entry_count as usize * entry_size;
        let next_ifd_offset = if header.is_bigtiff {
            byte_order.read_u64(&bytes[next_start..])
        } else {
            byte_order.read_u32(&bytes[next_start..]) as u64
        };

        Ok(Ifd {
            offset,
            entries,
            next_ifd_offset,
        })
    }

    /// Find an entry by tag.
    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag.as_u16())
    }

    /// Inline single u32 value of a tag.
    pub fn get_u32(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    /// Image width in pixels.
    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageWidth, byte_order)
    }

    /// Image height in pixels.
    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageLength, byte_order)
    }

    /// Samples per pixel.
    pub fn samples_per_pixel(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::SamplesPerPixel, byte_order)
    }

    /// Tile width in pixels.
    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileWidth, byte_order)
    }

    /// Tile height in pixels.
    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileLength, byte_order)
    }

    /// Compression code.
    pub fn compression(&self, byte_order: ByteOrder) -> Option<u16> {
        self.get_u32(TiffTag::Compression, byte_order)
            .map(|v| v as u16)
    }

    /// NewSubfileType flags (0 when absent).
    pub fn subfile_type(&self, byte_order: ByteOrder) -> u32 {
        self.get_u32(TiffTag::NewSubfileType, byte_order)
            .unwrap_or(0)
    }
}

// =============================================================================
// TiffFile
// =============================================================================

/// A TIFF file opened for metadata reads.
pub struct TiffFile<R: Read + Seek> {
    reader: R,
    header: TiffHeader,
    size: u64,
}

impl TiffFile<BufReader<File>> {
    /// Open a file on disk.
    pub fn open(path: &Path) -> Result<Self, TiffError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> TiffFile<R> {
    /// Read and validate the header.
    pub fn new(mut reader: R) -> Result<Self, TiffError> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let header_len = (size as usize).min(BIGTIFF_HEADER_SIZE);
        let mut bytes = vec![0u8; header_len];
        reader.read_exact(&mut bytes)?;
        let header = TiffHeader::parse(&bytes, size)?;

        Ok(Self {
            reader,
            header,
            size,
        })
    }

    /// The parsed header.
    pub fn header(&self) -> &TiffHeader {
        &self.header
    }

    /// Total file size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Value reader over this file.
    pub fn values(&mut self) -> ValueReader<'_, R> {
        ValueReader::new(&mut self.reader, &self.header, self.size)
    }

    /// Follow the IFD chain from the header and parse every IFD.
    pub fn read_ifds(&mut self) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut offset = self.header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if offset >= self.size {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let count_size = self.header.ifd_count_size();
            let count_bytes = self.values().read_at(offset, count_size)?;
            let entry_count = if self.header.is_bigtiff {
                self.header.byte_order.read_u64(&count_bytes)
            } else {
                self.header.byte_order.read_u16(&count_bytes) as u64
            };

            // read_at rejects a directory running past the end before allocating
            let ifd_size = Ifd::calculate_size(entry_count, &self.header)?;
            let ifd_bytes = self.values().read_at(offset, ifd_size)?;
            let ifd = Ifd::parse(&ifd_bytes, offset, &self.header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }
}

// =============================================================================
// Tests
// =============================================================================

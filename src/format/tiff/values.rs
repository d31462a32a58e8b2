//! TIFF tag value reading.
//!
//! Values are either inline in the IFD entry (small values) or stored at an
//! offset in the file (arrays, strings). Arrays such as TileOffsets are read
//! with a single seek and read.

use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;

use crate::error::TiffError;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values respecting the file's byte order and format.
pub struct ValueReader<'a, R: Read + Seek> {
    reader: &'a mut R,
    header: &'a TiffHeader,
    size: u64,
}

impl<'a, R: Read + Seek> ValueReader<'a, R> {
    /// Create a new ValueReader over a file of `size` bytes.
    pub fn new(reader: &'a mut R, header: &'a TiffHeader, size: u64) -> Self {
        Self {
            reader,
            header,
            size,
        }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read `len` bytes at `offset`, bounds-checked against the file size.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes, TiffError> {
        let end = offset.saturating_add(len as u64);
        if end > self.size {
            return Err(TiffError::FileTooSmall {
                required: end,
                actual: self.size,
            });
        }
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Read raw bytes for an IFD entry's value.
    pub fn read_bytes(&mut self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        if entry.field_type.is_none() {
            return Err(TiffError::UnknownFieldType(entry.field_type_raw));
        }
        let size = entry
            .value_byte_size()
            .and_then(|size| usize::try_from(size).ok())
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "count",
                message: format!("{} values do not fit in memory", entry.count),
            })?;

        if entry.is_inline {
            Ok(Bytes::copy_from_slice(&entry.value_offset_bytes[..size]))
        } else {
            self.read_at(entry.value_offset, size)
        }
    }

    /// Read an array of u64 values (Short, Long or Long8).
    pub fn read_u64_array(&mut self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if !matches!(
            field_type,
            FieldType::Short | FieldType::Long | FieldType::Long8
        ) {
            return Err(TiffError::InvalidTagValue {
                tag: "array",
                message: format!("expected Short, Long, or Long8, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry)?;
        Ok(parse_u64_array(
            &bytes,
            entry.count as usize,
            field_type,
            self.byte_order(),
        ))
    }

    /// Read an array of u32 values (Short or Long).
    pub fn read_u32_array(&mut self, entry: &IfdEntry) -> Result<Vec<u32>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if !matches!(field_type, FieldType::Short | FieldType::Long) {
            return Err(TiffError::InvalidTagValue {
                tag: "array",
                message: format!("expected Short or Long, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry)?;
        Ok(parse_u64_array(
            &bytes,
            entry.count as usize,
            field_type,
            self.byte_order(),
        )
        .into_iter()
        .map(|v| v as u32)
        .collect())
    }

    /// Read a NUL-terminated ASCII value. The terminator is stripped.
    pub fn read_string(&mut self, entry: &IfdEntry) -> Result<String, TiffError> {
        if entry.field_type != Some(FieldType::Ascii) {
            return Err(TiffError::InvalidTagValue {
                tag: "string",
                message: format!("expected Ascii, got type {}", entry.field_type_raw),
            });
        }

        let bytes = self.read_bytes(entry)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

/// Parse an array of integer values from raw bytes.
///
/// Values that would run past the end of `bytes` are dropped.
fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    bytes
        .chunks_exact(width)
        .take(count)
        .filter_map(|chunk| match field_type {
            FieldType::Byte => Some(chunk[0] as u64),
            FieldType::Short => Some(byte_order.read_u16(chunk) as u64),
            FieldType::Long => Some(byte_order.read_u32(chunk) as u64),
            FieldType::Long8 => Some(byte_order.read_u64(chunk)),
            _ => None,
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

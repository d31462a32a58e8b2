//! Little-endian BigTIFF writer.
//!
//! The writer is append-only: tile payloads go out first through
//! [`BigTiffWriter::write_block`], then the directory describing them through
//! [`BigTiffWriter::write_ifd`]. Each new IFD is linked from the previous
//! one (or from the header) by patching the 8-byte next-IFD pointer in place.
//!
//! All blocks start on an even offset (TIFF word alignment).

use std::io::{self, Seek, SeekFrom, Write};

use super::parser::{BIGTIFF_HEADER_SIZE, VERSION_BIGTIFF};
use super::tags::{FieldType, TiffTag};

/// Size of one BigTIFF IFD entry.
const ENTRY_SIZE: u64 = 20;

/// Values up to this many bytes live inside the entry itself.
const INLINE_VALUE_SIZE: usize = 8;

// =============================================================================
// IfdBuilder
// =============================================================================

#[derive(Debug, Clone)]
struct PendingEntry {
    tag: u16,
    field_type: FieldType,
    count: u64,
    data: Vec<u8>,
}

/// Collects the entries of one IFD.
///
/// Adding a tag twice replaces the earlier value.
#[derive(Debug, Clone, Default)]
pub struct IfdBuilder {
    entries: Vec<PendingEntry>,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, tag: TiffTag, field_type: FieldType, count: u64, data: Vec<u8>) -> &mut Self {
        let code = tag.as_u16();
        self.entries.retain(|e| e.tag != code);
        self.entries.push(PendingEntry {
            tag: code,
            field_type,
            count,
            data,
        });
        self
    }

    /// Single SHORT.
    pub fn short(&mut self, tag: TiffTag, value: u16) -> &mut Self {
        self.shorts(tag, &[value])
    }

    /// SHORT array.
    pub fn shorts(&mut self, tag: TiffTag, values: &[u16]) -> &mut Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(tag, FieldType::Short, values.len() as u64, data)
    }

    /// Single LONG.
    pub fn long(&mut self, tag: TiffTag, value: u32) -> &mut Self {
        self.push(tag, FieldType::Long, 1, value.to_le_bytes().to_vec())
    }

    /// LONG8 array, used for tile offsets and byte counts.
    pub fn long8s(&mut self, tag: TiffTag, values: &[u64]) -> &mut Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(tag, FieldType::Long8, values.len() as u64, data)
    }

    /// Single RATIONAL.
    pub fn rational(&mut self, tag: TiffTag, numerator: u32, denominator: u32) -> &mut Self {
        let mut data = numerator.to_le_bytes().to_vec();
        data.extend_from_slice(&denominator.to_le_bytes());
        self.push(tag, FieldType::Rational, 1, data)
    }

    /// NUL-terminated ASCII string.
    pub fn ascii(&mut self, tag: TiffTag, value: &str) -> &mut Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        let count = data.len() as u64;
        self.push(tag, FieldType::Ascii, count, data)
    }
}

// =============================================================================
// BigTiffWriter
// =============================================================================

/// Streams a BigTIFF file to any seekable sink.
pub struct BigTiffWriter<W: Write + Seek> {
    inner: W,
    /// Current end of file
    position: u64,
    /// Where the next IFD offset must be patched in
    link_position: u64,
}

impl<W: Write + Seek> BigTiffWriter<W> {
    /// Write the 16-byte header. The first-IFD pointer is patched later.
    pub fn new(mut inner: W) -> io::Result<Self> {
        let mut header = Vec::with_capacity(BIGTIFF_HEADER_SIZE);
        header.extend_from_slice(b"II");
        header.extend_from_slice(&VERSION_BIGTIFF.to_le_bytes());
        header.extend_from_slice(&8u16.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes());
        inner.write_all(&header)?;

        Ok(Self {
            inner,
            position: BIGTIFF_HEADER_SIZE as u64,
            link_position: 8,
        })
    }

    /// Append raw bytes and return the offset they start at.
    pub fn write_block(&mut self, data: &[u8]) -> io::Result<u64> {
        let offset = self.position;
        self.inner.write_all(data)?;
        self.position += data.len() as u64;
        if self.position % 2 == 1 {
            self.inner.write_all(&[0])?;
            self.position += 1;
        }
        Ok(offset)
    }

    /// Append an IFD and link it into the chain. Returns its offset.
    pub fn write_ifd(&mut self, ifd: &IfdBuilder) -> io::Result<u64> {
        let mut entries = ifd.entries.clone();
        entries.sort_by_key(|e| e.tag);

        // Out-of-line values go before the directory
        let mut fields = Vec::with_capacity(entries.len());
        for entry in &entries {
            let mut field = [0u8; INLINE_VALUE_SIZE];
            if entry.data.len() <= INLINE_VALUE_SIZE {
                field[..entry.data.len()].copy_from_slice(&entry.data);
            } else {
                let offset = self.write_block(&entry.data)?;
                field = offset.to_le_bytes();
            }
            fields.push(field);
        }

        let ifd_offset = self.position;
        let mut bytes = Vec::with_capacity(16 + entries.len() * ENTRY_SIZE as usize);
        bytes.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        for (entry, field) in entries.iter().zip(&fields) {
            bytes.extend_from_slice(&entry.tag.to_le_bytes());
            bytes.extend_from_slice(&(entry.field_type as u16).to_le_bytes());
            bytes.extend_from_slice(&entry.count.to_le_bytes());
            bytes.extend_from_slice(field);
        }
        bytes.extend_from_slice(&0u64.to_le_bytes());
        self.write_block(&bytes)?;

        self.patch_u64(self.link_position, ifd_offset)?;
        self.link_position = ifd_offset + 8 + entries.len() as u64 * ENTRY_SIZE;

        Ok(ifd_offset)
    }

    fn patch_u64(&mut self, at: u64, value: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(at))?;
        self.inner.write_all(&value.to_le_bytes())?;
        self.inner.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Read-back of a written tiled pyramid.
//!
//! After a pyramid is serialized the IFD chain is re-read and checked: every
//! level must be tiled with one offset/byte-count pair per tile per plane, all
//! tile data must lie inside the file, level 0 must be the full-resolution
//! image and every later level a reduced-resolution subfile half its size.
//!
//! Tests use the same reader to pull individual compressed tiles back out.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use bytes::Bytes;

use crate::error::TiffError;

use super::parser::{ByteOrder, Ifd, TiffFile};
use super::tags::{TiffTag, PLANAR_SEPARATE, SUBFILE_REDUCED_IMAGE};

// =============================================================================
// PyramidLevel
// =============================================================================

/// One tiled IFD of the pyramid.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// Index of this level (0 = full resolution)
    pub level_index: usize,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,

    /// Samples per pixel (one plane per channel)
    pub samples_per_pixel: u32,

    /// Bits per sample of the first channel
    pub bits_per_sample: u32,

    /// Compression code
    pub compression: u16,

    /// PlanarConfiguration (2 = separate planes)
    pub planar_configuration: u32,

    /// NewSubfileType flags
    pub subfile_type: u32,

    /// Tile offsets, plane-major
    pub tile_offsets: Vec<u64>,

    /// Tile byte counts, parallel to `tile_offsets`
    pub tile_byte_counts: Vec<u64>,
}

impl PyramidLevel {
    fn from_ifd<R: Read + Seek>(
        tiff: &mut TiffFile<R>,
        ifd: &Ifd,
        level_index: usize,
        byte_order: ByteOrder,
    ) -> Result<Self, TiffError> {
        let width = ifd
            .image_width(byte_order)
            .ok_or(TiffError::MissingTag("ImageWidth"))?;
        let height = ifd
            .image_height(byte_order)
            .ok_or(TiffError::MissingTag("ImageLength"))?;
        let tile_width = ifd
            .tile_width(byte_order)
            .ok_or(TiffError::MissingTag("TileWidth"))?;
        let tile_height = ifd
            .tile_height(byte_order)
            .ok_or(TiffError::MissingTag("TileLength"))?;
        if tile_width == 0 || tile_height == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: "TileWidth",
                message: "tile dimensions must be non-zero".to_string(),
            });
        }

        let offsets_entry = ifd
            .get_entry_by_tag(TiffTag::TileOffsets)
            .ok_or(TiffError::MissingTag("TileOffsets"))?;
        let counts_entry = ifd
            .get_entry_by_tag(TiffTag::TileByteCounts)
            .ok_or(TiffError::MissingTag("TileByteCounts"))?;
        let tile_offsets = tiff.values().read_u64_array(offsets_entry)?;
        let tile_byte_counts = tiff.values().read_u64_array(counts_entry)?;

        let bits_per_sample = match ifd.get_entry_by_tag(TiffTag::BitsPerSample) {
            Some(entry) => tiff
                .values()
                .read_u32_array(entry)?
                .first()
                .copied()
                .unwrap_or(1),
            None => 1,
        };

        Ok(PyramidLevel {
            level_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
            samples_per_pixel: ifd.samples_per_pixel(byte_order).unwrap_or(1),
            bits_per_sample,
            compression: ifd.compression(byte_order).unwrap_or(1),
            planar_configuration: ifd
                .get_u32(TiffTag::PlanarConfiguration, byte_order)
                .unwrap_or(1),
            subfile_type: ifd.subfile_type(byte_order),
            tile_offsets,
            tile_byte_counts,
        })
    }

    /// Tiles in one channel plane.
    pub fn tiles_per_plane(&self) -> usize {
        (self.tiles_x as usize).saturating_mul(self.tiles_y as usize)
    }

    /// Index into the tile arrays for a plane and tile coordinate.
    pub fn tile_index(&self, plane: u32, tile_x: u32, tile_y: u32) -> Option<usize> {
        if plane >= self.samples_per_pixel || tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(
            plane as usize * self.tiles_per_plane()
                + tile_y as usize * self.tiles_x as usize
                + tile_x as usize,
        )
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// A tiled pyramid read back from disk.
pub struct TiffPyramid<R: Read + Seek> {
    tiff: TiffFile<R>,

    /// Levels in file order
    pub levels: Vec<PyramidLevel>,

    /// ImageDescription of the first IFD, if present
    pub description: Option<String>,
}

impl TiffPyramid<BufReader<File>> {
    /// Open and parse a pyramid file.
    pub fn open(path: &Path) -> Result<Self, TiffError> {
        Self::parse(TiffFile::open(path)?)
    }
}

impl<R: Read + Seek> TiffPyramid<R> {
    /// Parse every IFD of an opened file as a pyramid level.
    pub fn parse(mut tiff: TiffFile<R>) -> Result<Self, TiffError> {
        let byte_order = tiff.header().byte_order;
        let ifds = tiff.read_ifds()?;

        let description = match ifds
            .first()
            .and_then(|ifd| ifd.get_entry_by_tag(TiffTag::ImageDescription))
        {
            Some(entry) => Some(tiff.values().read_string(entry)?),
            None => None,
        };

        let levels = ifds
            .iter()
            .enumerate()
            .map(|(index, ifd)| PyramidLevel::from_ifd(&mut tiff, ifd, index, byte_order))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tiff,
            levels,
            description,
        })
    }

    /// Number of levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Read the compressed bytes of one tile.
    pub fn read_tile(
        &mut self,
        level: usize,
        plane: u32,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        let lvl = self.levels.get(level).ok_or(TiffError::InvalidTagValue {
            tag: "level",
            message: format!("no level {level}"),
        })?;
        let index = lvl
            .tile_index(plane, tile_x, tile_y)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!("tile ({tile_x},{tile_y}) plane {plane} out of range"),
            })?;
        let (offset, length) = lvl
            .tile_offsets
            .get(index)
            .zip(lvl.tile_byte_counts.get(index))
            .ok_or(TiffError::MissingTag("TileOffsets"))?;
        let length = usize::try_from(*length).map_err(|_| TiffError::InvalidTagValue {
            tag: "TileByteCounts",
            message: format!("tile of {length} bytes"),
        })?;
        self.tiff.values().read_at(*offset, length)
    }

    /// Check the structural invariants of the pyramid.
    pub fn check_structure(&self) -> Result<(), TiffError> {
        if self.levels.is_empty() {
            return Err(TiffError::MissingTag("ImageWidth"));
        }

        let file_size = self.tiff.size();
        for level in &self.levels {
            let invalid = |tag: &'static str, message: String| TiffError::InvalidTagValue {
                tag,
                message: format!("level {}: {message}", level.level_index),
            };

            let expected_tiles = level
                .tiles_per_plane()
                .saturating_mul(level.samples_per_pixel as usize);
            if level.tile_offsets.len() != expected_tiles
                || level.tile_byte_counts.len() != expected_tiles
            {
                return Err(invalid(
                    "TileOffsets",
                    format!(
                        "expected {expected_tiles} tiles, found {} offsets and {} byte counts",
                        level.tile_offsets.len(),
                        level.tile_byte_counts.len()
                    ),
                ));
            }

            for (&offset, &count) in level.tile_offsets.iter().zip(&level.tile_byte_counts) {
                if offset.saturating_add(count) > file_size {
                    return Err(invalid(
                        "TileByteCounts",
                        format!("tile at {offset} (+{count}) runs past end of file"),
                    ));
                }
            }

            if level.samples_per_pixel > 1 && level.planar_configuration != PLANAR_SEPARATE as u32 {
                return Err(invalid(
                    "PlanarConfiguration",
                    format!("expected separate planes, got {}", level.planar_configuration),
                ));
            }

            let reduced = level.subfile_type & SUBFILE_REDUCED_IMAGE != 0;
            if reduced != (level.level_index > 0) {
                return Err(invalid(
                    "NewSubfileType",
                    format!("unexpected subfile type {}", level.subfile_type),
                ));
            }
        }

        for pair in self.levels.windows(2) {
            let (larger, smaller) = (&pair[0], &pair[1]);
            if smaller.width != larger.width / 2 || smaller.height != larger.height / 2 {
                return Err(TiffError::InvalidTagValue {
                    tag: "ImageWidth",
                    message: format!(
                        "level {} is {}x{}, expected half of {}x{}",
                        smaller.level_index,
                        smaller.width,
                        smaller.height,
                        larger.width,
                        larger.height
                    ),
                });
            }
            if smaller.samples_per_pixel != larger.samples_per_pixel {
                return Err(TiffError::InvalidTagValue {
                    tag: "SamplesPerPixel",
                    message: format!("level {} changes channel count", smaller.level_index),
                });
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Pyramidal OME-TIFF output.
//!
//! Every pyramid level becomes one tiled IFD of a little-endian BigTIFF, full
//! resolution first. Channels are stored as separate planes and tiles are
//! written plane by plane, row by row. Level 0 carries the OME-XML document;
//! later levels are marked as reduced images of it.

use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use ndarray::s;
use tracing::{debug, info, warn};

use crate::error::{EncodeError, MosaicError};
use crate::format::tiff::{
    BigTiffWriter, Compression, IfdBuilder, TiffPyramid, TiffTag, EXTRA_SAMPLE_UNSPECIFIED,
    PHOTOMETRIC_MIN_IS_BLACK, PLANAR_SEPARATE, RESOLUTION_UNIT_NONE, SAMPLE_FORMAT_UINT,
    SUBFILE_REDUCED_IMAGE,
};
use crate::format::{ome_xml, OmeImage};
use crate::tile::{TileEncoder, DEFAULT_JPEG_QUALITY};

use super::channels::ChannelDescriptor;
use super::context::RunContext;
use super::pyramid::{Pyramid, PyramidLevel};

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: usize = 512;

/// TIFF requires tile edges to be multiples of 16.
pub const TILE_SIZE_MULTIPLE: usize = 16;

/// Name of the image in the OME document.
pub const IMAGE_NAME: &str = "Merged Image";

const SOFTWARE: &str = concat!("slide-mosaic ", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Options
// =============================================================================

/// How tiles are cut and compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingOptions {
    pub compression: Compression,
    pub tile_size: usize,
    /// Only used with JPEG compression
    pub jpeg_quality: u8,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self {
            compression: Compression::AdobeDeflate,
            tile_size: DEFAULT_TILE_SIZE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

// =============================================================================
// MosaicOutput
// =============================================================================

/// Everything the encoder needs: the pyramid, one descriptor per canvas
/// channel and the encoding options.
#[derive(Debug, Clone)]
pub struct MosaicOutput {
    pyramid: Pyramid,
    channels: Vec<ChannelDescriptor>,
    options: EncodingOptions,
}

impl MosaicOutput {
    pub fn new(pyramid: Pyramid, channels: Vec<ChannelDescriptor>, options: EncodingOptions) -> Self {
        Self {
            pyramid,
            channels,
            options,
        }
    }

    pub fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }

    pub fn channels(&self) -> &[ChannelDescriptor] {
        &self.channels
    }

    pub fn options(&self) -> &EncodingOptions {
        &self.options
    }

    /// Write the file, verify it, and return its size in bytes.
    ///
    /// The output is either complete and verified, or removed.
    pub fn write_file(self, ctx: &mut RunContext, path: &Path) -> Result<u64, MosaicError> {
        let file = File::create(path).map_err(|source| MosaicError::CreateOutput {
            path: path.to_path_buf(),
            source,
        })?;

        let result = self
            .write_to(ctx, BufWriter::new(file))
            .and_then(|_| verify_file(path, self.pyramid.len()));
        drop(self);

        match result {
            Ok(bytes) => {
                info!(parent: ctx.span(), bytes = bytes, "Wrote {}", path.display());
                let report = ctx.report_mut();
                report.output = Some(path.to_path_buf());
                report.bytes_written = bytes;
                Ok(bytes)
            }
            Err(source) => {
                if let Err(e) = fs::remove_file(path) {
                    warn!(
                        parent: ctx.span(),
                        "Could not remove partial output {}: {}",
                        path.display(),
                        e
                    );
                }
                Err(MosaicError::Encode {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Encode every level into `sink` and hand it back flushed.
    pub fn write_to<W: Write + Seek>(&self, ctx: &RunContext, sink: W) -> Result<W, EncodeError> {
        let base = self.pyramid.base();
        if self.channels.len() != base.channels() {
            return Err(EncodeError::InvalidLevel {
                level: 0,
                message: format!(
                    "{} channel descriptor(s) for {} canvas channel(s)",
                    self.channels.len(),
                    base.channels()
                ),
            });
        }
        let tile_size = self.options.tile_size;
        if tile_size == 0 || tile_size % TILE_SIZE_MULTIPLE != 0 {
            return Err(EncodeError::InvalidLevel {
                level: 0,
                message: format!(
                    "tile size {tile_size} is not a positive multiple of {TILE_SIZE_MULTIPLE}"
                ),
            });
        }

        let encoder = TileEncoder::new(self.options.compression, self.options.jpeg_quality);
        info!(
            parent: ctx.span(),
            compression = self.options.compression.name(),
            "Writing {} pyramid level(s) with {}px tiles",
            self.pyramid.len(),
            tile_size
        );

        let description = ome_xml(
            &OmeImage {
                name: IMAGE_NAME.to_string(),
                width: base.width(),
                height: base.height(),
                pixel_type: pixel_type(self.options.compression),
            },
            &self.channels,
        );

        let mut writer = BigTiffWriter::new(sink)?;
        for (index, level) in self.pyramid.levels().iter().enumerate() {
            let (offsets, byte_counts) = write_level_tiles(&mut writer, &encoder, level, tile_size)?;
            let ifd = self.level_ifd(index, level, &offsets, &byte_counts, &description)?;
            writer.write_ifd(&ifd)?;
            debug!(
                parent: ctx.span(),
                level = index,
                tiles = offsets.len(),
                "Wrote level {}x{}",
                level.width(),
                level.height()
            );
        }
        Ok(writer.finish()?)
    }

    fn level_ifd(
        &self,
        index: usize,
        level: &PyramidLevel,
        offsets: &[u64],
        byte_counts: &[u64],
        description: &str,
    ) -> Result<IfdBuilder, EncodeError> {
        let invalid = |message: String| EncodeError::InvalidLevel {
            level: index,
            message,
        };
        let width = u32::try_from(level.width())
            .map_err(|_| invalid(format!("width {} exceeds TIFF limits", level.width())))?;
        let height = u32::try_from(level.height())
            .map_err(|_| invalid(format!("height {} exceeds TIFF limits", level.height())))?;
        let channels = u16::try_from(level.channels())
            .map_err(|_| invalid(format!("{} channels exceed TIFF limits", level.channels())))?;
        if width == 0 || height == 0 || channels == 0 {
            return Err(invalid(format!(
                "empty level {}x{} with {} channel(s)",
                width, height, channels
            )));
        }
        let tile_size = self.options.tile_size as u32;
        let compression = self.options.compression;
        let samples = usize::from(channels);

        let mut ifd = IfdBuilder::new();
        ifd.long(TiffTag::NewSubfileType, if index == 0 { 0 } else { SUBFILE_REDUCED_IMAGE })
            .long(TiffTag::ImageWidth, width)
            .long(TiffTag::ImageLength, height)
            .shorts(TiffTag::BitsPerSample, &vec![compression.bits_per_sample(); samples])
            .short(TiffTag::Compression, compression.as_u16())
            .short(TiffTag::PhotometricInterpretation, PHOTOMETRIC_MIN_IS_BLACK)
            .short(TiffTag::SamplesPerPixel, channels)
            .rational(TiffTag::XResolution, 1, 1)
            .rational(TiffTag::YResolution, 1, 1)
            .short(TiffTag::PlanarConfiguration, PLANAR_SEPARATE)
            .short(TiffTag::ResolutionUnit, RESOLUTION_UNIT_NONE)
            .ascii(TiffTag::Software, SOFTWARE)
            .long(TiffTag::TileWidth, tile_size)
            .long(TiffTag::TileLength, tile_size)
            .long8s(TiffTag::TileOffsets, offsets)
            .long8s(TiffTag::TileByteCounts, byte_counts)
            .shorts(TiffTag::SampleFormat, &vec![SAMPLE_FORMAT_UINT; samples]);

        if index == 0 {
            ifd.ascii(TiffTag::ImageDescription, description);
        }
        if samples > 1 {
            ifd.shorts(
                TiffTag::ExtraSamples,
                &vec![EXTRA_SAMPLE_UNSPECIFIED; samples - 1],
            );
        }
        Ok(ifd)
    }
}

/// Compress and append every tile of a level, plane-major.
fn write_level_tiles<W: Write + Seek>(
    writer: &mut BigTiffWriter<W>,
    encoder: &TileEncoder,
    level: &PyramidLevel,
    tile_size: usize,
) -> Result<(Vec<u64>, Vec<u64>), EncodeError> {
    let (height, width, channels) = level.data().dim();
    let tiles_x = width.div_ceil(tile_size);
    let tiles_y = height.div_ceil(tile_size);

    let total = tiles_x * tiles_y * channels;
    let mut offsets = Vec::with_capacity(total);
    let mut byte_counts = Vec::with_capacity(total);

    for plane in 0..channels {
        for ty in 0..tiles_y {
            let y0 = ty * tile_size;
            let y1 = (y0 + tile_size).min(height);
            for tx in 0..tiles_x {
                let x0 = tx * tile_size;
                let x1 = (x0 + tile_size).min(width);
                let region = level.data().slice(s![y0..y1, x0..x1, plane]);
                let tile = encoder.encode(region, tile_size)?;
                offsets.push(writer.write_block(&tile)?);
                byte_counts.push(tile.len() as u64);
            }
        }
    }
    Ok((offsets, byte_counts))
}

/// Re-read a written file and check its pyramid structure.
fn verify_file(path: &Path, expected_levels: usize) -> Result<u64, EncodeError> {
    let pyramid = TiffPyramid::open(path)?;
    pyramid.check_structure()?;
    if pyramid.level_count() != expected_levels {
        return Err(EncodeError::InvalidLevel {
            level: pyramid.level_count(),
            message: format!(
                "file has {} level(s), expected {}",
                pyramid.level_count(),
                expected_levels
            ),
        });
    }
    Ok(fs::metadata(path)?.len())
}

fn pixel_type(compression: Compression) -> &'static str {
    if compression.bits_per_sample() == 8 {
        "uint8"
    } else {
        "uint16"
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Tile sources.
//!
//! A [`TileSource`] turns a tile path into pixel data. The mosaic pipeline only
//! sees the trait, so producer-specific readers can be plugged in without the
//! compositor knowing about them.
//!
//! [`TiffTileSource`] is the local-file implementation, built on the `tiff`
//! crate. Probing walks the IFD chain without reading strip or tile data;
//! decoding converts every sample type to the `u16` canvas sample.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, Axis};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::TileError;
use crate::mosaic::normalize::ProducerQuirk;

/// TIFF `PageName` tag, used by multi-page exporters to label channels.
const PAGE_NAME_TAG: u16 = 285;

// =============================================================================
// Sample Types
// =============================================================================

/// Native sample type of a tile file, before conversion to the canvas type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl SampleType {
    /// Resolve a sample type from TIFF `BitsPerSample` and `SampleFormat`.
    ///
    /// `sample_format` follows the TIFF codes (1 = unsigned, 2 = signed, 3 = float).
    pub fn from_tiff(bits_per_sample: u32, sample_format: u32) -> Option<Self> {
        match (sample_format, bits_per_sample) {
            (1, 8) => Some(SampleType::U8),
            (1, 16) => Some(SampleType::U16),
            (1, 32) => Some(SampleType::U32),
            (1, 64) => Some(SampleType::U64),
            (2, 8) => Some(SampleType::I8),
            (2, 16) => Some(SampleType::I16),
            (2, 32) => Some(SampleType::I32),
            (2, 64) => Some(SampleType::I64),
            (3, 32) => Some(SampleType::F32),
            (3, 64) => Some(SampleType::F64),
            _ => None,
        }
    }
}

// =============================================================================
// Tile Data
// =============================================================================

/// Declared geometry of a tile, as read from its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileShape {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub sample_type: SampleType,
}

/// Raw decoded samples, already converted to the canvas sample type.
#[derive(Debug, Clone, PartialEq)]
pub enum TileSamples {
    /// A single band, indexed `[row, col]`
    Plane(Array2<u16>),
    /// Several bands, indexed `[row, col, channel]`
    Stack(Array3<u16>),
}

impl TileSamples {
    /// `(height, width, channels)` of the buffer.
    pub fn dim(&self) -> (usize, usize, usize) {
        match self {
            TileSamples::Plane(plane) => {
                let (h, w) = plane.dim();
                (h, w, 1)
            }
            TileSamples::Stack(stack) => stack.dim(),
        }
    }
}

/// A fully decoded tile.
#[derive(Debug, Clone)]
pub struct DecodedTile {
    pub samples: TileSamples,
    pub sample_type: SampleType,
    /// Per-channel names found in the file, if the producer wrote any
    pub channel_names: Vec<Option<String>>,
}

// =============================================================================
// TileSource Trait
// =============================================================================

/// Decode interface for tile files.
pub trait TileSource {
    /// Read width, height and channel count without materializing pixel data
    /// where the format allows it.
    fn probe(&self, path: &Path) -> Result<TileShape, TileError>;

    /// Decode the full pixel buffer.
    fn decode(&self, path: &Path) -> Result<DecodedTile, TileError>;

    /// Producer-specific transforms this source's files may need.
    fn producer_quirks(&self) -> &[ProducerQuirk] {
        &[]
    }
}

// =============================================================================
// TIFF Tile Source
// =============================================================================

/// Reads tiles from local TIFF files.
#[derive(Debug, Clone, Default)]
pub struct TiffTileSource {
    quirks: Vec<ProducerQuirk>,
}

impl TiffTileSource {
    /// Create a source with no producer quirks enabled.
    pub fn new() -> Self {
        Self { quirks: Vec::new() }
    }

    /// Enable a producer quirk for files read through this source.
    pub fn with_quirk(mut self, quirk: ProducerQuirk) -> Self {
        self.quirks.push(quirk);
        self
    }

    fn open(path: &Path) -> Result<Decoder<BufReader<File>>, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())
    }

    /// Probe from the IFD chain only.
    fn probe_metadata(path: &Path) -> Result<TileShape, String> {
        let mut decoder = Self::open(path)?;

        let (width, height) = decoder.dimensions().map_err(|e| e.to_string())?;
        let samples_per_pixel = first_tag_value(&mut decoder, Tag::SamplesPerPixel)?;
        let bits = first_tag_value(&mut decoder, Tag::BitsPerSample)?;
        let format = first_tag_value(&mut decoder, Tag::SampleFormat)?;
        let sample_type = SampleType::from_tiff(bits, format)
            .ok_or_else(|| format!("unsupported sample layout: {bits} bits, format {format}"))?;

        // Single-band pages of identical size are a channel stack
        let mut channels = samples_per_pixel;
        if samples_per_pixel == 1 {
            while decoder.more_images() {
                decoder.next_image().map_err(|e| e.to_string())?;
                if decoder.dimensions().map_err(|e| e.to_string())? != (width, height) {
                    break;
                }
                channels += 1;
            }
        }

        Ok(TileShape {
            width,
            height,
            channels,
            sample_type,
        })
    }
}

impl TileSource for TiffTileSource {
    fn probe(&self, path: &Path) -> Result<TileShape, TileError> {
        Self::probe_metadata(path).map_err(|message| TileError::Probe {
            path: path.to_path_buf(),
            message,
        })
    }

    fn decode(&self, path: &Path) -> Result<DecodedTile, TileError> {
        let decode_err = |message: String| TileError::Decode {
            path: path.to_path_buf(),
            message,
        };

        let mut decoder = Self::open(path)
            .map_err(decode_err)?
            .with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions().map_err(|e| decode_err(e.to_string()))?;
        let mut pages: Vec<Array3<u16>> = Vec::new();
        let mut channel_names = Vec::new();
        let mut sample_type = SampleType::U16;

        loop {
            let page_dims = decoder.dimensions().map_err(|e| decode_err(e.to_string()))?;
            if page_dims != (width, height) {
                debug!(
                    "{}: stopping at page {} with different size {}x{}",
                    path.display(),
                    pages.len(),
                    page_dims.0,
                    page_dims.1
                );
                break;
            }

            let result = decoder.read_image().map_err(|e| decode_err(e.to_string()))?;
            let (page_type, samples) =
                to_canvas_samples(result).map_err(|message| TileError::UnsupportedLayout {
                    path: path.to_path_buf(),
                    message,
                })?;
            sample_type = page_type;

            let pixels = width as usize * height as usize;
            if pixels == 0 || samples.len() % pixels != 0 {
                return Err(decode_err(format!(
                    "buffer of {} samples does not fit {}x{}",
                    samples.len(),
                    width,
                    height
                )));
            }
            let samples_per_pixel = samples.len() / pixels;
            let page = Array3::from_shape_vec(
                (height as usize, width as usize, samples_per_pixel),
                samples,
            )
            .map_err(|e| decode_err(e.to_string()))?;

            let name = page_name(&mut decoder);
            channel_names.extend(std::iter::repeat(name).take(samples_per_pixel));
            pages.push(page);

            if !decoder.more_images() {
                break;
            }
            decoder
                .next_image()
                .map_err(|e| decode_err(e.to_string()))?;
        }

        let samples = match pages.len() {
            0 => return Err(decode_err("no image data".to_string())),
            1 if pages[0].dim().2 == 1 => {
                TileSamples::Plane(pages.remove(0).index_axis_move(Axis(2), 0))
            }
            1 => TileSamples::Stack(pages.remove(0)),
            _ => {
                let views: Vec<_> = pages.iter().map(|p| p.view()).collect();
                let stacked = ndarray::concatenate(Axis(2), &views)
                    .map_err(|e| decode_err(e.to_string()))?;
                TileSamples::Stack(stacked)
            }
        };

        Ok(DecodedTile {
            samples,
            sample_type,
            channel_names,
        })
    }

    fn producer_quirks(&self) -> &[ProducerQuirk] {
        &self.quirks
    }
}

/// First value of an unsigned tag of the current page; TIFF's default of 1
/// when the tag is absent.
fn first_tag_value<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Result<u32, String> {
    let values = decoder
        .find_tag_unsigned_vec::<u32>(tag)
        .map_err(|e| format!("{tag:?}: {e}"))?;
    Ok(values.and_then(|v| v.first().copied()).unwrap_or(1))
}

/// Read the `PageName` of the current page, if present.
fn page_name<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<String> {
    match decoder.find_tag(Tag::from_u16_exhaustive(PAGE_NAME_TAG)) {
        Ok(Some(tiff::decoder::ifd::Value::Ascii(name))) => Some(name),
        _ => None,
    }
}

// =============================================================================
// Sample Conversion
// =============================================================================

/// Conversion of a native sample into the `u16` canvas sample.
///
/// Integers saturate at the `u16` range; floats truncate toward zero with
/// negatives and NaN mapping to 0.
trait IntoCanvasSample: Copy {
    fn into_canvas_sample(self) -> u16;
}

macro_rules! impl_integer_sample {
    ($($t:ty),*) => {
        $(
            impl IntoCanvasSample for $t {
                #[inline]
                #[allow(unused_comparisons)]
                fn into_canvas_sample(self) -> u16 {
                    u16::try_from(self).unwrap_or(if self < 0 { 0 } else { u16::MAX })
                }
            }
        )*
    };
}

impl_integer_sample!(u8, u16, u32, u64, i8, i16, i32, i64);

impl IntoCanvasSample for f32 {
    #[inline]
    fn into_canvas_sample(self) -> u16 {
        self as u16
    }
}

impl IntoCanvasSample for f64 {
    #[inline]
    fn into_canvas_sample(self) -> u16 {
        self as u16
    }
}

fn convert<T: IntoCanvasSample>(samples: Vec<T>) -> Vec<u16> {
    samples.into_iter().map(T::into_canvas_sample).collect()
}

fn to_canvas_samples(result: DecodingResult) -> Result<(SampleType, Vec<u16>), String> {
    let converted = match result {
        DecodingResult::U8(buf) => (SampleType::U8, convert(buf)),
        DecodingResult::U16(buf) => (SampleType::U16, buf),
        DecodingResult::U32(buf) => (SampleType::U32, convert(buf)),
        DecodingResult::U64(buf) => (SampleType::U64, convert(buf)),
        DecodingResult::I8(buf) => (SampleType::I8, convert(buf)),
        DecodingResult::I16(buf) => (SampleType::I16, convert(buf)),
        DecodingResult::I32(buf) => (SampleType::I32, convert(buf)),
        DecodingResult::I64(buf) => (SampleType::I64, convert(buf)),
        DecodingResult::F32(buf) => (SampleType::F32, convert(buf)),
        DecodingResult::F64(buf) => (SampleType::F64, convert(buf)),
        #[allow(unreachable_patterns)]
        _ => return Err("sample type not supported".to_string()),
    };
    Ok(converted)
}

/// List candidate tile files (`.tif` / `.tiff`, any case) directly inside `folder`,
/// sorted by file name.
pub fn list_tile_files(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_tiff = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"))
            .unwrap_or(false);
        if is_tiff {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_type_from_tiff() {
        assert_eq!(SampleType::from_tiff(8, 1), Some(SampleType::U8));
        assert_eq!(SampleType::from_tiff(16, 1), Some(SampleType::U16));
        assert_eq!(SampleType::from_tiff(32, 3), Some(SampleType::F32));
        assert_eq!(SampleType::from_tiff(16, 2), Some(SampleType::I16));
        assert_eq!(SampleType::from_tiff(12, 1), None);
        assert_eq!(SampleType::from_tiff(16, 3), None);
    }

    #[test]
    fn test_integer_conversion_saturates() {
        assert_eq!(200u8.into_canvas_sample(), 200);
        assert_eq!(70_000u32.into_canvas_sample(), u16::MAX);
        assert_eq!((-5i16).into_canvas_sample(), 0);
        assert_eq!(1234i32.into_canvas_sample(), 1234);
    }

    #[test]
    fn test_float_conversion_truncates() {
        assert_eq!(12.9f32.into_canvas_sample(), 12);
        assert_eq!((-3.0f32).into_canvas_sample(), 0);
        assert_eq!(f32::NAN.into_canvas_sample(), 0);
        assert_eq!(1e9f64.into_canvas_sample(), u16::MAX);
    }

    #[test]
    fn test_to_canvas_samples() {
        let (ty, samples) = to_canvas_samples(DecodingResult::F32(vec![1.5, 2.5])).unwrap();
        assert_eq!(ty, SampleType::F32);
        assert_eq!(samples, vec![1, 2]);
    }

    #[test]
    fn test_tile_samples_dim() {
        let plane = TileSamples::Plane(Array2::zeros((4, 5)));
        assert_eq!(plane.dim(), (4, 5, 1));

        let stack = TileSamples::Stack(Array3::zeros((4, 5, 3)));
        assert_eq!(stack.dim(), (4, 5, 3));
    }

    #[test]
    fn test_list_tile_files_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_[1,1].tif", "a_[0,0].TIFF", "notes.txt", "c.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.tif")).unwrap();

        let files = list_tile_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_[0,0].TIFF", "b_[1,1].tif"]);
    }

    #[test]
    fn test_list_tile_files_missing_folder() {
        let result = list_tile_files(Path::new("/definitely/not/here"));
        assert!(result.is_err());
    }
}

//! Test utilities for integration tests.
//!
//! Helpers for writing synthetic tile TIFFs with the `tiff` crate encoder and
//! for reading tiles and planes back out of a written mosaic.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use ndarray::Array2;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use xz2::read::XzDecoder;

use slide_mosaic::format::tiff::{Compression, TiffPyramid};
use slide_mosaic::mosaic::{MosaicJob, ProducerQuirk, RunContext, RunOutcome};
use slide_mosaic::TiffTileSource;

// =============================================================================
// Synthetic Tiles
// =============================================================================

/// Samples of a `width × height` tile where each value encodes its position:
/// `base + row * 10 + col`.
pub fn position_samples(width: u32, height: u32, base: u16) -> Vec<u16> {
    (0..height)
        .flat_map(|r| (0..width).map(move |c| base + (r * 10 + c) as u16))
        .collect()
}

/// Write a single-page 16-bit grayscale TIFF.
pub fn write_gray16(path: &Path, width: u32, height: u32, samples: &[u16]) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::Gray16>(width, height, samples)
        .unwrap();
}

/// Write a single-page 8-bit grayscale TIFF.
pub fn write_gray8(path: &Path, width: u32, height: u32, samples: &[u8]) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::Gray8>(width, height, samples)
        .unwrap();
}

/// Write a single-page 16-bit RGB TIFF.
pub fn write_rgb16(path: &Path, width: u32, height: u32, samples: &[u16]) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    encoder
        .write_image::<colortype::RGB16>(width, height, samples)
        .unwrap();
}

/// Write one 16-bit grayscale page per channel, each labelled with a PageName.
pub fn write_channel_pages(path: &Path, width: u32, height: u32, pages: &[(&str, Vec<u16>)]) {
    let mut encoder = TiffEncoder::new(File::create(path).unwrap()).unwrap();
    for (name, samples) in pages {
        let mut image = encoder
            .new_image::<colortype::Gray16>(width, height)
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::Unknown(285), *name)
            .unwrap();
        image.write_data(samples).unwrap();
    }
}

/// Write a file with a `.tif` name that is not a TIFF.
pub fn write_garbage(path: &Path) {
    std::fs::write(path, b"this is not a tiff file").unwrap();
}

// =============================================================================
// Runs
// =============================================================================

/// Job writing `mosaic.ome.tif` next to (not inside) the tile folder.
pub fn job_for(dir: &Path, channel_names: &[&str]) -> MosaicJob {
    let tiles = dir.join("tiles");
    std::fs::create_dir_all(&tiles).unwrap();
    let mut job = MosaicJob::new(tiles, dir.join("mosaic.ome.tif"));
    job.channels = channel_names.len();
    job.channel_names = channel_names.iter().map(|s| s.to_string()).collect();
    job
}

/// Run `job` with the Akoya quirk enabled.
pub fn run_job(job: &MosaicJob) -> (RunOutcome, RunContext) {
    let source = TiffTileSource::new().with_quirk(ProducerQuirk::akoya_component_data());
    let mut ctx = RunContext::new(job.folder.display());
    let outcome = job.run(&mut ctx, &source).unwrap();
    (outcome, ctx)
}

pub fn written_path(outcome: &RunOutcome) -> PathBuf {
    match outcome {
        RunOutcome::Written { path, .. } => path.clone(),
        RunOutcome::NoTiles => panic!("expected a written mosaic"),
    }
}

// =============================================================================
// Reading Output
// =============================================================================

/// Decompress one output tile into `u16` samples.
pub fn decode_tile(compression: u16, data: &[u8]) -> Vec<u16> {
    let raw = if compression == Compression::AdobeDeflate.as_u16() {
        let mut raw = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut raw).unwrap();
        raw
    } else if compression == Compression::Lzma.as_u16() {
        let mut raw = Vec::new();
        XzDecoder::new(data).read_to_end(&mut raw).unwrap();
        raw
    } else if compression == Compression::None.as_u16() {
        data.to_vec()
    } else {
        panic!("cannot decode tiles compressed with code {compression}");
    };
    raw.chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Reassemble one channel plane of one level from its tiles.
pub fn read_plane(path: &Path, level: usize, plane: u32) -> Array2<u16> {
    let mut pyramid = TiffPyramid::open(path).unwrap();
    let info = pyramid.levels[level].clone();
    let edge = info.tile_width as usize;
    let (width, height) = (info.width as usize, info.height as usize);

    let mut out = Array2::zeros((height, width));
    for ty in 0..info.tiles_y {
        for tx in 0..info.tiles_x {
            let tile = pyramid.read_tile(level, plane, tx, ty).unwrap();
            let samples = decode_tile(info.compression, &tile);
            for r in 0..edge {
                for c in 0..edge {
                    let (row, col) = (ty as usize * edge + r, tx as usize * edge + c);
                    if row < height && col < width {
                        out[[row, col]] = samples[r * edge + c];
                    }
                }
            }
        }
    }
    out
}

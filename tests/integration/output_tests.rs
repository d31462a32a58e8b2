//! Output container tests.
//!
//! Tests verify:
//! - The file is a little-endian BigTIFF with one IFD per pyramid level
//! - Reduced levels are flagged and point-sampled from full resolution
//! - The OME-XML on level 0 describes every channel in canvas order
//! - Every compression scheme produces a readable file

use slide_mosaic::format::tiff::{
    Compression, TiffFile, TiffTag, PLANAR_SEPARATE, SUBFILE_REDUCED_IMAGE,
};
use slide_mosaic::TiffPyramid;

use super::test_utils::{job_for, read_plane, run_job, write_gray16, written_path};

const OME_NS: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06";

/// Two 10x10 tiles far enough apart for a two-level pyramid (330 x 330).
fn two_level_job(dir: &std::path::Path, names: &[&str]) -> slide_mosaic::MosaicJob {
    let job = job_for(dir, names);
    let samples: Vec<u16> = (0..100).collect();
    write_gray16(&job.folder.join("a_[0,0].tif"), 10, 10, &samples);
    write_gray16(&job.folder.join("b_[300,300].tif"), 10, 10, &samples);
    job
}

// =============================================================================
// Container Structure
// =============================================================================

#[test]
fn test_bigtiff_header() {
    let dir = tempfile::tempdir().unwrap();
    let job = two_level_job(dir.path(), &["DAPI"]);
    let (outcome, _) = run_job(&job);

    let bytes = std::fs::read(written_path(&outcome)).unwrap();
    assert_eq!(&bytes[0..2], b"II");
    assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 43);
    assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 8);
}

#[test]
fn test_pyramid_levels_are_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let job = two_level_job(dir.path(), &["DAPI", "Opal 480"]);
    let (outcome, ctx) = run_job(&job);
    let path = written_path(&outcome);

    let pyramid = TiffPyramid::open(&path).unwrap();
    pyramid.check_structure().unwrap();

    let dims: Vec<(u32, u32)> = pyramid.levels.iter().map(|l| (l.width, l.height)).collect();
    assert_eq!(dims, vec![(330, 330), (165, 165)]);
    assert_eq!(pyramid.levels[0].subfile_type, 0);
    assert_eq!(pyramid.levels[1].subfile_type, SUBFILE_REDUCED_IMAGE);

    for level in &pyramid.levels {
        assert_eq!(level.samples_per_pixel, 2);
        assert_eq!(level.planar_configuration, u32::from(PLANAR_SEPARATE));
        assert_eq!(level.tile_width, 512);
        assert_eq!(level.compression, Compression::AdobeDeflate.as_u16());
    }
    assert_eq!(ctx.report().levels.len(), 2);
    assert_eq!(ctx.report().bytes_written, std::fs::metadata(&path).unwrap().len());
}

#[test]
fn test_reduced_level_is_point_sampled() {
    let dir = tempfile::tempdir().unwrap();
    let job = two_level_job(dir.path(), &["DAPI"]);
    let (outcome, _) = run_job(&job);
    let path = written_path(&outcome);

    let full = read_plane(&path, 0, 0);
    let half = read_plane(&path, 1, 0);
    assert_eq!(half.dim(), (165, 165));
    for ((r, c), &value) in half.indexed_iter() {
        assert_eq!(value, full[[2 * r, 2 * c]]);
    }
    assert_eq!(half[[150, 151]], full[[300, 302]]);
}

// =============================================================================
// OME Metadata
// =============================================================================

#[test]
fn test_ome_channels() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = two_level_job(dir.path(), &["DAPI", "Unrecognized Label", "Sample AF"]);
    job.channel_names.truncate(2);
    let (outcome, _) = run_job(&job);

    let pyramid = TiffPyramid::open(&written_path(&outcome)).unwrap();
    let xml = pyramid.description.unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();

    let pixels = doc
        .descendants()
        .find(|n| n.has_tag_name((OME_NS, "Pixels")))
        .unwrap();
    assert_eq!(pixels.attribute("SizeX"), Some("330"));
    assert_eq!(pixels.attribute("SizeC"), Some("3"));
    assert_eq!(pixels.attribute("Type"), Some("uint16"));

    let channels: Vec<_> = pixels
        .children()
        .filter(|n| n.has_tag_name((OME_NS, "Channel")))
        .collect();
    assert_eq!(channels.len(), 3);

    assert_eq!(channels[0].attribute("Name"), Some("DAPI"));
    assert_eq!(channels[0].attribute("Color"), Some("65535"));
    assert_eq!(channels[0].attribute("EmissionWavelength"), Some("461"));

    assert_eq!(channels[1].attribute("Name"), Some("Unrecognized Label"));
    assert_eq!(channels[1].attribute("Fluor"), Some("Unknown"));
    assert_eq!(channels[1].attribute("Color"), Some("-1"));

    assert_eq!(channels[2].attribute("Name"), Some("Channel 3"));
}

#[test]
fn test_description_only_on_first_ifd() {
    let dir = tempfile::tempdir().unwrap();
    let job = two_level_job(dir.path(), &["DAPI"]);
    let (outcome, _) = run_job(&job);

    let mut tiff = TiffFile::open(&written_path(&outcome)).unwrap();
    let ifds = tiff.read_ifds().unwrap();
    assert_eq!(ifds.len(), 2);
    assert!(ifds[0].get_entry_by_tag(TiffTag::ImageDescription).is_some());
    assert!(ifds[1].get_entry_by_tag(TiffTag::ImageDescription).is_none());
}

// =============================================================================
// Compression Schemes
// =============================================================================

#[test]
fn test_lzma_and_uncompressed_round_trip() {
    for compression in [Compression::Lzma, Compression::None] {
        let dir = tempfile::tempdir().unwrap();
        let mut job = job_for(dir.path(), &["DAPI"]);
        job.encoding.compression = compression;
        job.encoding.tile_size = 16;
        let samples: Vec<u16> = (0..400).map(|v| v * 100).collect();
        write_gray16(&job.folder.join("t_[3,4].tif"), 20, 20, &samples);

        let (outcome, _) = run_job(&job);
        let path = written_path(&outcome);
        let pyramid = TiffPyramid::open(&path).unwrap();
        assert_eq!(pyramid.levels[0].compression, compression.as_u16());

        let plane = read_plane(&path, 0, 0);
        assert_eq!(plane.dim(), (44, 43));
        assert_eq!(plane[[4, 3]], samples[0]);
        assert_eq!(plane[[23, 22]], samples[399]);
    }
}

#[test]
fn test_jpeg_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job_for(dir.path(), &["DAPI"]);
    job.encoding.compression = Compression::Jpeg;
    write_gray16(&job.folder.join("t_[0,0].tif"), 8, 8, &[200; 64]);

    let (outcome, _) = run_job(&job);
    let pyramid = TiffPyramid::open(&written_path(&outcome)).unwrap();

    assert_eq!(pyramid.levels[0].compression, Compression::Jpeg.as_u16());
    assert_eq!(pyramid.levels[0].bits_per_sample, 8);
    assert!(pyramid.description.unwrap().contains(r#"Type="uint8""#));
}

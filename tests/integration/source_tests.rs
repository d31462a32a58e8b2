//! TIFF tile source tests.
//!
//! Tests verify:
//! - Metadata probing of single-page, multi-page and RGB files
//! - Decoding into planes and channel stacks with `u16` samples
//! - Page names are reported as channel names
//! - Broken or hostile files yield tile errors instead of failing the run

use slide_mosaic::io::{SampleType, TiffTileSource, TileSamples, TileSource};
use slide_mosaic::TileError;

use super::test_utils::{
    job_for, position_samples, read_plane, run_job, write_channel_pages, write_garbage,
    write_gray16, write_gray8, write_rgb16, written_path,
};

// =============================================================================
// Probe
// =============================================================================

#[test]
fn test_probe_gray16() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    write_gray16(&path, 7, 5, &position_samples(7, 5, 0));

    let shape = TiffTileSource::new().probe(&path).unwrap();
    assert_eq!((shape.width, shape.height, shape.channels), (7, 5, 1));
    assert_eq!(shape.sample_type, SampleType::U16);
}

#[test]
fn test_probe_counts_pages_as_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    write_channel_pages(
        &path,
        3,
        2,
        &[("A", vec![1; 6]), ("B", vec![2; 6]), ("C", vec![3; 6])],
    );

    let shape = TiffTileSource::new().probe(&path).unwrap();
    assert_eq!((shape.width, shape.height, shape.channels), (3, 2, 3));
}

#[test]
fn test_probe_rgb16() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    write_rgb16(&path, 2, 2, &[0; 12]);

    let shape = TiffTileSource::new().probe(&path).unwrap();
    assert_eq!(shape.channels, 3);
}

#[test]
fn test_probe_garbage_is_probe_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    write_garbage(&path);

    let err = TiffTileSource::new().probe(&path).unwrap_err();
    assert!(matches!(err, TileError::Probe { .. }));
    assert_eq!(err.kind(), "probe");
}

/// BigTIFF header followed by an IFD that declares `2^62` entries.
fn write_oversized_ifd(path: &std::path::Path) {
    let mut data = vec![0x49, 0x49, 0x2B, 0x00, 0x08, 0x00, 0x00, 0x00];
    data.extend(16u64.to_le_bytes());
    data.extend((1u64 << 62).to_le_bytes());
    data.extend([0u8; 64]);
    std::fs::write(path, data).unwrap();
}

#[test]
fn test_probe_oversized_ifd_is_probe_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_[0,0].tif");
    write_oversized_ifd(&path);

    let source = TiffTileSource::new();
    assert!(matches!(source.probe(&path), Err(TileError::Probe { .. })));
    assert!(matches!(source.decode(&path), Err(TileError::Decode { .. })));
}

#[test]
fn test_oversized_ifd_tile_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let job = job_for(dir.path(), &["DAPI"]);
    write_oversized_ifd(&job.folder.join("bad_[50,50].tif"));
    write_gray16(&job.folder.join("good_[0,0].tif"), 4, 4, &[9; 16]);

    let (outcome, ctx) = run_job(&job);

    assert_eq!(read_plane(&written_path(&outcome), 0, 0).dim(), (24, 24));
    let kinds: Vec<&str> = ctx.report().tile_skips.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec!["probe"]);
}

// =============================================================================
// Decode
// =============================================================================

#[test]
fn test_decode_single_page_is_plane() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    let samples = position_samples(4, 3, 500);
    write_gray16(&path, 4, 3, &samples);

    let tile = TiffTileSource::new().decode(&path).unwrap();
    match tile.samples {
        TileSamples::Plane(plane) => {
            assert_eq!(plane.dim(), (3, 4));
            assert_eq!(plane[[2, 3]], samples[2 * 4 + 3]);
        }
        other => panic!("expected a plane, got {:?}", other.dim()),
    }
}

#[test]
fn test_decode_gray8_widens_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    write_gray8(&path, 2, 2, &[0, 1, 128, 255]);

    let tile = TiffTileSource::new().decode(&path).unwrap();
    assert_eq!(tile.sample_type, SampleType::U8);
    match tile.samples {
        TileSamples::Plane(plane) => {
            assert_eq!(plane.iter().copied().collect::<Vec<_>>(), vec![0, 1, 128, 255])
        }
        other => panic!("expected a plane, got {:?}", other.dim()),
    }
}

#[test]
fn test_decode_rgb_is_stack() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    // Pixel-interleaved: (r, g, b) = (1, 2, 3) everywhere
    write_rgb16(&path, 2, 2, &[1, 2, 3, 1, 2, 3, 1, 2, 3, 1, 2, 3]);

    let tile = TiffTileSource::new().decode(&path).unwrap();
    match tile.samples {
        TileSamples::Stack(stack) => {
            assert_eq!(stack.dim(), (2, 2, 3));
            assert_eq!(stack[[1, 1, 0]], 1);
            assert_eq!(stack[[1, 1, 2]], 3);
        }
        other => panic!("expected a stack, got {:?}", other.dim()),
    }
}

#[test]
fn test_decode_pages_with_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    write_channel_pages(
        &path,
        2,
        2,
        &[("DAPI", vec![11; 4]), ("Opal 570", vec![22; 4])],
    );

    let tile = TiffTileSource::new().decode(&path).unwrap();
    assert_eq!(
        tile.channel_names,
        vec![Some("DAPI".to_string()), Some("Opal 570".to_string())]
    );
    match tile.samples {
        TileSamples::Stack(stack) => {
            assert_eq!(stack.dim(), (2, 2, 2));
            assert_eq!(stack[[0, 1, 0]], 11);
            assert_eq!(stack[[1, 0, 1]], 22);
        }
        other => panic!("expected a stack, got {:?}", other.dim()),
    }
}

#[test]
fn test_decode_garbage_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t_[0,0].tif");
    write_garbage(&path);

    assert!(matches!(
        TiffTileSource::new().decode(&path),
        Err(TileError::Decode { .. })
    ));
}

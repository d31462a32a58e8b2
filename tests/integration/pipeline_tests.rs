//! End-to-end pipeline tests.
//!
//! Tests verify:
//! - Overlapping tiles composite last-write-wins
//! - Tiles are clipped to the canvas and skipped tiles are reported
//! - Empty folders and coordinate-less tiles are handled without crashing
//! - Producer quirks and unmixing are applied before encoding

use slide_mosaic::mosaic::{RunOutcome, UnmixingMatrix};
use slide_mosaic::TiffPyramid;

use super::test_utils::{
    job_for, position_samples, read_plane, run_job, write_channel_pages, write_garbage,
    write_gray16, written_path,
};

// =============================================================================
// Compositing
// =============================================================================

#[test]
fn test_overlap_is_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let job = job_for(dir.path(), &["DAPI"]);
    let tile_a = position_samples(10, 10, 100);
    let tile_b = position_samples(10, 10, 1000);
    write_gray16(&job.folder.join("a_[0,0].tif"), 10, 10, &tile_a);
    write_gray16(&job.folder.join("b_[5,5].tif"), 10, 10, &tile_b);

    let (outcome, ctx) = run_job(&job);
    let plane = read_plane(&written_path(&outcome), 0, 0);

    assert_eq!(plane.dim(), (35, 35));
    // Overlap region holds tile B
    assert_eq!(plane[[7, 7]], tile_b[2 * 10 + 2]);
    // Outside the overlap tile A survives
    assert_eq!(plane[[1, 1]], tile_a[10 + 1]);
    assert_eq!(plane[[4, 9]], tile_a[4 * 10 + 9]);
    // Margin stays empty
    assert_eq!(plane[[34, 34]], 0);
    assert_eq!(plane[[15, 15]], 0);

    let report = ctx.report();
    assert_eq!(report.files_found, 2);
    assert_eq!(report.tiles_placed, 2);
    assert!(report.tile_skips.is_empty());
    assert_eq!(report.canvas, Some((35, 35, 1)));
}

#[test]
fn test_pattern_selects_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job_for(dir.path(), &["DAPI"]);
    job.pattern = Some("keep*".to_string());
    write_gray16(&job.folder.join("keep_[0,0].tif"), 4, 4, &[7; 16]);
    write_gray16(&job.folder.join("drop_[30,30].tif"), 4, 4, &[9; 16]);

    let (outcome, ctx) = run_job(&job);
    let plane = read_plane(&written_path(&outcome), 0, 0);

    assert_eq!(plane.dim(), (24, 24));
    assert_eq!(plane[[3, 3]], 7);
    assert_eq!(ctx.report().files_found, 1);
}

#[test]
fn test_unreadable_tiles_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let job = job_for(dir.path(), &["DAPI"]);
    write_gray16(&job.folder.join("good_[2,3].tif"), 5, 5, &[42; 25]);
    write_garbage(&job.folder.join("bad_[100,100].tif"));
    write_gray16(&job.folder.join("unplaced.tif"), 5, 5, &[1; 25]);

    let (outcome, ctx) = run_job(&job);
    let plane = read_plane(&written_path(&outcome), 0, 0);

    // Extent ignores the unreadable tile
    assert_eq!(plane.dim(), (28, 27));
    assert_eq!(plane[[3, 2]], 42);

    let kinds: Vec<&str> = ctx.report().tile_skips.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, vec!["probe", "no_coordinates"]);
    assert_eq!(ctx.report().tiles_placed, 1);
}

// =============================================================================
// Boundary Cases
// =============================================================================

#[test]
fn test_empty_folder_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let job = job_for(dir.path(), &["DAPI"]);

    let (outcome, ctx) = run_job(&job);

    assert_eq!(outcome, RunOutcome::NoTiles);
    assert!(!job.output.exists());
    assert_eq!(ctx.report().files_found, 0);
    assert!(ctx.report().output.is_none());
}

#[test]
fn test_no_coordinates_gives_margin_canvas() {
    let dir = tempfile::tempdir().unwrap();
    let job = job_for(dir.path(), &["DAPI", "Opal 480"]);
    write_gray16(&job.folder.join("first.tif"), 8, 8, &[5; 64]);
    write_gray16(&job.folder.join("second.tif"), 8, 8, &[5; 64]);

    let (outcome, ctx) = run_job(&job);
    let path = written_path(&outcome);

    let pyramid = TiffPyramid::open(&path).unwrap();
    assert_eq!((pyramid.levels[0].width, pyramid.levels[0].height), (20, 20));
    assert_eq!(pyramid.level_count(), 1);
    assert!(read_plane(&path, 0, 1).iter().all(|&v| v == 0));
    assert_eq!(ctx.report().tile_skips.len(), 2);
    assert_eq!(ctx.report().tiles_placed, 0);
}

#[test]
fn test_output_inside_tile_folder_is_not_an_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job_for(dir.path(), &["DAPI"]);
    job.output = job.folder.join("mosaic_[0,0].tif");
    write_gray16(&job.folder.join("t_[0,0].tif"), 4, 4, &[3; 16]);

    run_job(&job);
    let (_, ctx) = run_job(&job);

    assert_eq!(ctx.report().files_found, 1);
    assert!(job.output.exists());
}

#[test]
fn test_output_spelled_differently_is_not_an_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job_for(dir.path(), &["DAPI"]);
    job.output = job.folder.join("..").join("tiles").join("mosaic_[0,0].tif");
    write_gray16(&job.folder.join("t_[0,0].tif"), 4, 4, &[3; 16]);

    run_job(&job);
    assert!(job.folder.join("mosaic_[0,0].tif").exists());
    let (outcome, ctx) = run_job(&job);

    assert_eq!(ctx.report().files_found, 1);
    assert_eq!(read_plane(&written_path(&outcome), 0, 0).dim(), (24, 24));
}

// =============================================================================
// Channel Processing
// =============================================================================

#[test]
fn test_component_data_bands_become_channels() {
    let dir = tempfile::tempdir().unwrap();
    let job = job_for(dir.path(), &["DAPI", "Opal 480", "Opal 520", "Opal 570"]);
    // 4 bands of 6 rows, 3 columns: value = row * 10 + col of the tall plane
    let tall = position_samples(3, 24, 0);
    write_gray16(&job.folder.join("s_[0,0]_component_data.tif"), 3, 24, &tall);

    let (outcome, ctx) = run_job(&job);
    let path = written_path(&outcome);

    for band in 0..4u32 {
        let plane = read_plane(&path, 0, band);
        for row in 0..6 {
            for col in 0..3 {
                let source_row = band as usize * 6 + row;
                assert_eq!(plane[[row, col]], tall[source_row * 3 + col]);
            }
        }
        // Rows below the unstacked tile stay empty
        assert_eq!(plane[[6, 0]], 0);
    }
    assert_eq!(ctx.report().tiles_reshaped, 1);
}

#[test]
fn test_multi_page_tiles_fill_channels() {
    let dir = tempfile::tempdir().unwrap();
    let job = job_for(dir.path(), &["DAPI", "Opal 520", "Opal 620"]);
    write_channel_pages(
        &job.folder.join("t_[1,1].tif"),
        2,
        2,
        &[("DAPI", vec![10; 4]), ("Opal 520", vec![20; 4])],
    );

    let (outcome, _) = run_job(&job);
    let path = written_path(&outcome);

    assert_eq!(read_plane(&path, 0, 0)[[1, 1]], 10);
    assert_eq!(read_plane(&path, 0, 1)[[2, 2]], 20);
    assert!(read_plane(&path, 0, 2).iter().all(|&v| v == 0));
}

#[test]
fn test_autofluorescence_subtraction() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = job_for(dir.path(), &["DAPI", "Sample AF"]);
    job.unmixing = Some(UnmixingMatrix::autofluorescence_subtraction(2, 1, 0.5).unwrap());
    write_channel_pages(
        &job.folder.join("t_[0,0].tif"),
        2,
        1,
        &[("DAPI", vec![100, 10]), ("Sample AF", vec![40, 40])],
    );

    let (outcome, _) = run_job(&job);
    let path = written_path(&outcome);

    let dapi = read_plane(&path, 0, 0);
    assert_eq!((dapi[[0, 0]], dapi[[0, 1]]), (80, 0));
    let af = read_plane(&path, 0, 1);
    assert_eq!((af[[0, 0]], af[[0, 1]]), (40, 40));
}

//! slide-mosaic - Stitch coordinate-named tiles into a pyramidal OME-TIFF.
//!
//! This binary parses the configuration, sets up logging and runs one mosaic job.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slide_mosaic::{
    config::Config,
    error::MosaicError,
    io::TiffTileSource,
    mosaic::{MosaicJob, ProducerQuirk, RunContext, RunOutcome, RunReport},
};

fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let job = match MosaicJob::from_config(&config) {
        Ok(job) => job,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Folder: {}", job.folder.display());
    info!("  Output: {}", job.output.display());
    if let Some(ref pattern) = job.pattern {
        info!("  Pattern: {}", pattern);
    }
    info!("  Channels: {} ({})", job.channels, job.channel_names.join(", "));
    info!(
        "  Compression: {}, {}px tiles",
        job.encoding.compression.name(),
        job.encoding.tile_size
    );
    if config.no_producer_quirks {
        info!("  Producer quirks: disabled");
    }

    let source = build_source(&config);
    let mut ctx = RunContext::new(job.folder.display());
    let result = job.run(&mut ctx, &source);
    let report = ctx.into_report();

    if let Some(ref path) = config.report {
        if let Err(e) = write_report(path, &report) {
            warn!("{}", e);
        }
    }

    match result {
        Ok(RunOutcome::Written { path, bytes }) => {
            print_summary(&report);
            info!("Wrote {} ({} bytes)", path.display(), bytes);
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::NoTiles) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "slide_mosaic=debug"
    } else {
        "slide_mosaic=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// TIFF tile source with the producer quirks the configuration allows.
fn build_source(config: &Config) -> TiffTileSource {
    let source = TiffTileSource::new();
    if config.no_producer_quirks {
        source
    } else {
        source.with_quirk(ProducerQuirk::akoya_component_data())
    }
}

fn print_summary(report: &RunReport) {
    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!(
        "  Tiles: {} found, {} analyzed, {} placed, {} reshaped",
        report.files_found, report.tiles_analyzed, report.tiles_placed, report.tiles_reshaped
    );
    if !report.tile_skips.is_empty() || !report.channel_skips.is_empty() {
        warn!(
            "  Skipped: {} tile(s), {} channel copy(ies)",
            report.tile_skips.len(),
            report.channel_skips.len()
        );
    }
    if let Some((width, height, channels)) = report.canvas {
        info!("  Canvas: {}x{} with {} channel(s)", width, height, channels);
    }
    info!("  Pyramid: {} level(s)", report.levels.len());
    info!("────────────────────────────────────────────────────────────────");
}

fn write_report(path: &Path, report: &RunReport) -> Result<(), MosaicError> {
    let report_error = |message: String| MosaicError::Report {
        path: path.to_path_buf(),
        message,
    };
    let json = serde_json::to_string_pretty(report).map_err(|e| report_error(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| report_error(e.to_string()))
}

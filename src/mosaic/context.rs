//! Per-run logging and bookkeeping.
//!
//! A [`RunContext`] is created for each mosaic run and passed into every stage.
//! It owns the run's tracing span, so log lines from all stages are grouped
//! under one run, and the [`RunReport`] that collects what happened to each
//! tile. Nothing here is global: two runs in one process keep separate reports.

use std::fmt::Display;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{info_span, warn, Span};

use crate::error::TileError;

// =============================================================================
// Run Report
// =============================================================================

/// A tile left off the canvas, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileSkip {
    pub tile: String,
    pub kind: &'static str,
    pub reason: String,
}

/// One channel of a tile that could not be copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSkip {
    pub tile: String,
    pub channel: usize,
    pub reason: String,
}

/// Dimensions of one written pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub width: usize,
    pub height: usize,
}

/// Summary of one run, serializable for `--report`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Candidate files after the name filter
    pub files_found: usize,
    /// Tiles whose placement and shape were determined
    pub tiles_analyzed: usize,
    /// Tiles with at least one channel copied onto the canvas
    pub tiles_placed: usize,
    /// Tiles rewritten by a producer quirk
    pub tiles_reshaped: usize,
    pub tile_skips: Vec<TileSkip>,
    pub channel_skips: Vec<ChannelSkip>,
    /// `(width, height, channels)` of the canvas
    pub canvas: Option<(usize, usize, usize)>,
    pub levels: Vec<LevelSummary>,
    pub output: Option<PathBuf>,
    pub bytes_written: u64,
}

// =============================================================================
// Run Context
// =============================================================================

/// Logging handle and report for one run.
#[derive(Debug)]
pub struct RunContext {
    span: Span,
    report: RunReport,
}

impl RunContext {
    /// Start a run labelled with its input location.
    pub fn new(label: impl Display) -> Self {
        Self {
            span: info_span!("mosaic_run", input = %label),
            report: RunReport::default(),
        }
    }

    /// Span all of the run's log lines belong to.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut RunReport {
        &mut self.report
    }

    /// Finish the run and hand back the report.
    pub fn into_report(self) -> RunReport {
        self.report
    }

    /// Log and record a tile that will not be placed.
    pub fn skip_tile(&mut self, tile: &str, error: &TileError) {
        warn!(
            parent: &self.span,
            tile = tile,
            error_type = error.kind(),
            "Skipping tile: {}",
            error
        );
        self.report.tile_skips.push(TileSkip {
            tile: tile.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        });
    }

    /// Log and record a channel of a tile that was not copied.
    pub fn skip_channel(&mut self, tile: &str, channel: usize, reason: impl Display) {
        warn!(
            parent: &self.span,
            tile = tile,
            channel = channel,
            "Skipping channel: {}",
            reason
        );
        self.report.channel_skips.push(ChannelSkip {
            tile: tile.to_string(),
            channel,
            reason: reason.to_string(),
        });
    }
}

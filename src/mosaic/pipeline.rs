//! End-to-end mosaic run.
//!
//! ```text
//! list files ─► inventory ─► compose canvas ─► unmix ─► pyramid ─► OME-TIFF
//! ```
//!
//! Stages run strictly one after another. Per-tile problems are logged and
//! recorded on the [`RunContext`]; only run-level failures end the run early.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config::Config;
use crate::error::MosaicError;
use crate::io::{list_tile_files, TileSource};

use super::canvas::{Compositor, DEFAULT_MARGIN};
use super::channels::{channel_names, resolve_channels, ChannelTable, DEFAULT_CHANNEL_NAMES};
use super::context::RunContext;
use super::inventory::{Inventory, NameFilter};
use super::normalize::{TileNormalizer, DEFAULT_MAX_TILE_CHANNELS};
use super::output::{EncodingOptions, MosaicOutput};
use super::pyramid::Pyramid;
use super::unmix::UnmixingMatrix;

/// Channel subtracted by `--subtract-autofluorescence`.
pub const AUTOFLUORESCENCE_CHANNEL: &str = "Sample AF";

/// How a run ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A verified pyramid was written
    Written { path: PathBuf, bytes: u64 },
    /// No tile files matched; nothing was written
    NoTiles,
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct MosaicJob {
    pub folder: PathBuf,
    pub output: PathBuf,
    pub pattern: Option<String>,
    /// Canvas channel count
    pub channels: usize,
    pub channel_names: Vec<String>,
    pub margin: usize,
    pub max_tile_channels: usize,
    pub encoding: EncodingOptions,
    pub channel_table: ChannelTable,
    pub unmixing: Option<UnmixingMatrix>,
}

impl MosaicJob {
    /// Job with default settings.
    pub fn new(folder: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            output: output.into(),
            pattern: None,
            channels: DEFAULT_CHANNEL_NAMES.len(),
            channel_names: DEFAULT_CHANNEL_NAMES.map(String::from).to_vec(),
            margin: DEFAULT_MARGIN,
            max_tile_channels: DEFAULT_MAX_TILE_CHANNELS,
            encoding: EncodingOptions::default(),
            channel_table: ChannelTable::builtin(),
            unmixing: None,
        }
    }

    /// Build a job from validated configuration, loading any referenced
    /// channel table or unmixing matrix.
    pub fn from_config(config: &Config) -> Result<Self, MosaicError> {
        let channel_table = match &config.channel_table {
            Some(path) => ChannelTable::from_path(path)?,
            None => ChannelTable::builtin(),
        };

        let unmixing = match (&config.unmixing_matrix, config.subtract_autofluorescence) {
            (Some(path), _) => Some(UnmixingMatrix::from_path(path)?),
            (None, Some(coefficient)) => {
                let names = channel_names(&config.channel_names, config.channels);
                let af_channel = names
                    .iter()
                    .position(|name| name == AUTOFLUORESCENCE_CHANNEL)
                    .ok_or_else(|| {
                        MosaicError::Config(format!(
                            "no '{AUTOFLUORESCENCE_CHANNEL}' channel to subtract"
                        ))
                    })?;
                Some(UnmixingMatrix::autofluorescence_subtraction(
                    config.channels,
                    af_channel,
                    coefficient,
                )?)
            }
            (None, None) => None,
        };

        Ok(Self {
            folder: config.folder.clone(),
            output: config.output.clone(),
            pattern: config.pattern.clone(),
            channels: config.channels,
            channel_names: config.channel_names.clone(),
            margin: config.margin,
            max_tile_channels: config.max_tile_channels,
            encoding: EncodingOptions {
                compression: config.compression(),
                tile_size: config.tile_size,
                jpeg_quality: config.jpeg_quality,
            },
            channel_table,
            unmixing,
        })
    }

    /// Run the whole pipeline, reading tiles through `source`.
    pub fn run(
        &self,
        ctx: &mut RunContext,
        source: &dyn TileSource,
    ) -> Result<RunOutcome, MosaicError> {
        if let Some(unmixing) = &self.unmixing {
            if unmixing.size() != self.channels {
                return Err(MosaicError::UnmixingMatrix(format!(
                    "matrix is {}x{} but the mosaic has {} channel(s)",
                    unmixing.size(),
                    unmixing.size(),
                    self.channels
                )));
            }
        }
        let filter = self
            .pattern
            .as_deref()
            .map(NameFilter::new)
            .transpose()
            .map_err(|e| MosaicError::Config(format!("invalid pattern: {e}")))?;

        let mut files = list_tile_files(&self.folder).map_err(|source| MosaicError::ReadDir {
            path: self.folder.clone(),
            source,
        })?;
        // A previous run's output may sit in the tile folder under another spelling
        let output = resolved(&self.output);
        files.retain(|path| resolved(path) != output);

        let inventory = Inventory::scan(ctx, source, &files, filter.as_ref());
        if ctx.report().files_found == 0 {
            error!(
                parent: ctx.span(),
                "No files found in {} matching the pattern",
                self.folder.display()
            );
            return Ok(RunOutcome::NoTiles);
        }

        let normalizer = TileNormalizer::for_source(source, self.max_tile_channels);
        let mut canvas =
            Compositor::new(source, normalizer).compose(ctx, &inventory, self.channels, self.margin)?;

        if let Some(unmixing) = &self.unmixing {
            info!(
                parent: ctx.span(),
                "Applying {}x{} unmixing matrix",
                unmixing.size(),
                unmixing.size()
            );
            unmixing.apply(canvas.data_mut())?;
        }

        let pyramid = Pyramid::build(ctx, canvas);
        let channels = resolve_channels(&self.channel_table, &self.channel_names, self.channels);
        for channel in &channels {
            info!(
                parent: ctx.span(),
                channel = channel.name.as_str(),
                color = %channel.color,
                "Channel fluor {}",
                channel.fluor
            );
        }

        let bytes = MosaicOutput::new(pyramid, channels, self.encoding).write_file(ctx, &self.output)?;
        Ok(RunOutcome::Written {
            path: self.output.clone(),
            bytes,
        })
    }
}

/// Canonical form of `path`, or the path itself when it cannot be resolved.
fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(args: &[&str]) -> Config {
        let mut argv = vec!["slide-mosaic", "--folder", "tiles", "--output", "out.tif"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_from_config_defaults() {
        let job = MosaicJob::from_config(&config(&[])).unwrap();
        assert_eq!(job.channels, 6);
        assert_eq!(job.margin, 20);
        assert!(job.unmixing.is_none());
        assert_eq!(job.channel_table, ChannelTable::builtin());
    }

    #[test]
    fn test_from_config_autofluorescence() {
        let job = MosaicJob::from_config(&config(&["--subtract-autofluorescence", "0.3"])).unwrap();
        let matrix = job.unmixing.unwrap();
        assert_eq!(matrix.size(), 6);
        assert_eq!(matrix.matrix()[[0, 5]], -0.3);
        assert_eq!(matrix.matrix()[[5, 5]], 1.0);
    }

    #[test]
    fn test_from_config_autofluorescence_needs_af_channel() {
        let result = MosaicJob::from_config(&config(&[
            "--channel-names",
            "DAPI,CD8",
            "--subtract-autofluorescence",
            "0.3",
        ]));
        assert!(matches!(result, Err(MosaicError::Config(_))));
    }

    #[test]
    fn test_missing_folder_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let job = MosaicJob::new(dir.path().join("missing"), dir.path().join("out.tif"));
        let mut ctx = RunContext::new("test");
        let result = job.run(&mut ctx, &crate::io::TiffTileSource::new());
        assert!(matches!(result, Err(MosaicError::ReadDir { .. })));
    }

    #[test]
    fn test_unmixing_size_checked_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = MosaicJob::new(dir.path(), dir.path().join("out.tif"));
        job.unmixing = Some(UnmixingMatrix::from_rows(vec![vec![1.0]]).unwrap());
        let mut ctx = RunContext::new("test");
        let result = job.run(&mut ctx, &crate::io::TiffTileSource::new());
        assert!(matches!(result, Err(MosaicError::UnmixingMatrix(_))));
    }

    #[test]
    fn test_empty_folder_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.tif");
        let job = MosaicJob::new(dir.path(), &output);
        let mut ctx = RunContext::new("test");

        let outcome = job.run(&mut ctx, &crate::io::TiffTileSource::new()).unwrap();
        assert_eq!(outcome, RunOutcome::NoTiles);
        assert!(!output.exists());
    }
}

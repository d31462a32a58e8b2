//! Tile inventory.
//!
//! Scans the candidate files, keeps the ones that match the name filter, parses
//! each name for its placement and probes each file for its shape. The extent
//! of all analyzed tiles fixes the canvas size before any pixel is decoded.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::error::TileError;
use crate::io::{TileShape, TileSource};

use super::context::RunContext;
use super::coords::parse_coordinates;

// =============================================================================
// Name Filter
// =============================================================================

/// File-name filter. `*` matches any run of characters; everything else is
/// literal. The pattern may match anywhere in the name.
#[derive(Debug, Clone)]
pub struct NameFilter {
    pattern: String,
    regex: Regex,
}

impl NameFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let translated = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(&translated)?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

// =============================================================================
// Tile Records
// =============================================================================

/// A tile whose placement and shape are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    pub path: PathBuf,
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub shape: TileShape,
}

impl TileRecord {
    /// One past the rightmost column covered by the tile.
    pub fn right(&self) -> u64 {
        self.x as u64 + self.shape.width as u64
    }

    /// One past the bottom row covered by the tile.
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.shape.height as u64
    }
}

/// Display name of a tile file.
pub fn tile_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// =============================================================================
// Inventory
// =============================================================================

/// All tiles that can be placed, in placement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub tiles: Vec<TileRecord>,
    /// `max(x + width)` over all tiles, 0 when empty
    pub max_x: u64,
    /// `max(y + height)` over all tiles, 0 when empty
    pub max_y: u64,
}

impl Inventory {
    /// Filter and analyze `files`, preserving their order.
    ///
    /// Tiles without coordinates or with an unreadable shape are recorded as
    /// skipped and left out.
    pub fn scan(
        ctx: &mut RunContext,
        source: &dyn TileSource,
        files: &[PathBuf],
        filter: Option<&NameFilter>,
    ) -> Self {
        let candidates: Vec<&PathBuf> = files
            .iter()
            .filter(|path| filter.map_or(true, |f| f.matches(&tile_name(path))))
            .collect();
        ctx.report_mut().files_found = candidates.len();
        info!(
            parent: ctx.span(),
            files = files.len(),
            matched = candidates.len(),
            "Found {} tile file(s)",
            candidates.len()
        );

        let mut inventory = Inventory::default();
        for path in candidates {
            let name = tile_name(path);

            let Some((x, y)) = parse_coordinates(&name) else {
                ctx.skip_tile(&name, &TileError::NoCoordinates { name: name.clone() });
                continue;
            };

            let shape = match source.probe(path) {
                Ok(shape) if shape.width > 0 && shape.height > 0 && shape.channels > 0 => shape,
                Ok(shape) => {
                    let error = TileError::Probe {
                        path: path.clone(),
                        message: format!(
                            "empty tile {}x{}x{}",
                            shape.width, shape.height, shape.channels
                        ),
                    };
                    ctx.skip_tile(&name, &error);
                    continue;
                }
                Err(error) => {
                    ctx.skip_tile(&name, &error);
                    continue;
                }
            };

            debug!(
                parent: ctx.span(),
                tile = name.as_str(),
                "at ({}, {}) {}x{}x{} {:?}",
                x,
                y,
                shape.width,
                shape.height,
                shape.channels,
                shape.sample_type
            );
            inventory.push(TileRecord {
                path: path.clone(),
                name,
                x,
                y,
                shape,
            });
        }

        ctx.report_mut().tiles_analyzed = inventory.tiles.len();
        info!(
            parent: ctx.span(),
            "Analyzed {} tile(s), extent {}x{}",
            inventory.tiles.len(),
            inventory.max_x,
            inventory.max_y
        );
        inventory
    }

    /// Add a record and grow the extent.
    pub fn push(&mut self, record: TileRecord) {
        self.max_x = self.max_x.max(record.right());
        self.max_y = self.max_y.max(record.bottom());
        self.tiles.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Canvas compositing.
//!
//! The canvas is allocated once from the inventory extent plus a margin and is
//! never resized. Tiles are decoded, normalized and copied in inventory order;
//! where tiles overlap, the later one overwrites the earlier one. Each copy is
//! clipped to the canvas and done channel by channel, and every channel gets an
//! explicit [`ChannelCopy`] result.

use std::fmt;

use ndarray::{s, Array3, ArrayView3};
use tracing::info;

use crate::error::{MosaicError, TileError};
use crate::io::TileSource;

use super::context::RunContext;
use super::inventory::Inventory;
use super::normalize::TileNormalizer;

/// Empty border added right of and below the furthest tile.
pub const DEFAULT_MARGIN: usize = 20;

// =============================================================================
// Placement Results
// =============================================================================

/// Why a channel of a tile was not copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSkipReason {
    /// The tile has more channels than the canvas
    ExceedsCanvasChannels { canvas_channels: usize },
}

impl fmt::Display for ChannelSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSkipReason::ExceedsCanvasChannels { canvas_channels } => {
                write!(f, "canvas has only {canvas_channels} channel(s)")
            }
        }
    }
}

/// Outcome for one channel of a placed tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCopy {
    Copied,
    Skipped(ChannelSkipReason),
}

/// Result of placing one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Canvas column of the copied region
    pub x: usize,
    /// Canvas row of the copied region
    pub y: usize,
    /// Width of the copied region (clipped)
    pub width: usize,
    /// Height of the copied region (clipped)
    pub height: usize,
    /// One entry per tile channel
    pub channels: Vec<ChannelCopy>,
}

impl Placement {
    pub fn copied_channels(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| matches!(c, ChannelCopy::Copied))
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (usize, &ChannelSkipReason)> {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(index, copy)| match copy {
                ChannelCopy::Skipped(reason) => Some((index, reason)),
                ChannelCopy::Copied => None,
            })
    }
}

// =============================================================================
// Canvas
// =============================================================================

/// Full-resolution composite, indexed `[row, col, channel]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    data: Array3<u16>,
}

impl Canvas {
    /// Zero-filled canvas.
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            data: Array3::zeros((height, width, channels)),
        }
    }

    /// Canvas covering every tile of `inventory` plus `margin`.
    ///
    /// An empty inventory gives a `margin × margin` canvas.
    pub fn for_inventory(
        inventory: &Inventory,
        channels: usize,
        margin: usize,
    ) -> Result<Self, MosaicError> {
        let width = inventory.max_x.saturating_add(margin as u64);
        let height = inventory.max_y.saturating_add(margin as u64);
        let too_large = || MosaicError::CanvasTooLarge {
            width,
            height,
            channels,
        };

        let w = usize::try_from(width).map_err(|_| too_large())?;
        let h = usize::try_from(height).map_err(|_| too_large())?;
        w.checked_mul(h)
            .and_then(|px| px.checked_mul(channels))
            .and_then(|n| n.checked_mul(std::mem::size_of::<u16>()))
            .filter(|&bytes| bytes <= isize::MAX as usize)
            .ok_or_else(too_large)?;

        Ok(Self::new(h, w, channels))
    }

    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    pub fn data(&self) -> &Array3<u16> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<u16> {
        &mut self.data
    }

    pub fn into_inner(self) -> Array3<u16> {
        self.data
    }

    /// Copy `tile` with its top-left corner at `(x, y)`, clipped to the canvas.
    ///
    /// Source and destination regions are both cut to the clipped extent, so a
    /// tile overhanging the canvas is trimmed rather than skipped. Fails only
    /// when the tile does not intersect the canvas at all.
    pub fn place(&mut self, tile: ArrayView3<'_, u16>, x: u32, y: u32) -> Result<Placement, TileError> {
        let (tile_h, tile_w, tile_c) = tile.dim();
        let (canvas_h, canvas_w, canvas_c) = self.data.dim();
        let (x0, y0) = (x as usize, y as usize);

        if x0 >= canvas_w || y0 >= canvas_h || tile_w == 0 || tile_h == 0 {
            return Err(TileError::OutsideCanvas {
                x,
                y,
                width: tile_w,
                height: tile_h,
                canvas_width: canvas_w,
                canvas_height: canvas_h,
            });
        }

        let copy_w = tile_w.min(canvas_w - x0);
        let copy_h = tile_h.min(canvas_h - y0);

        let channels = (0..tile_c)
            .map(|c| {
                if c >= canvas_c {
                    return ChannelCopy::Skipped(ChannelSkipReason::ExceedsCanvasChannels {
                        canvas_channels: canvas_c,
                    });
                }
                self.data
                    .slice_mut(s![y0..y0 + copy_h, x0..x0 + copy_w, c])
                    .assign(&tile.slice(s![..copy_h, ..copy_w, c]));
                ChannelCopy::Copied
            })
            .collect();

        Ok(Placement {
            x: x0,
            y: y0,
            width: copy_w,
            height: copy_h,
            channels,
        })
    }
}

// =============================================================================
// Compositor
// =============================================================================

/// Decodes, normalizes and places every inventoried tile.
pub struct Compositor<'a> {
    source: &'a dyn TileSource,
    normalizer: TileNormalizer,
}

impl<'a> Compositor<'a> {
    pub fn new(source: &'a dyn TileSource, normalizer: TileNormalizer) -> Self {
        Self { source, normalizer }
    }

    /// Build the canvas for `inventory`.
    pub fn compose(
        &self,
        ctx: &mut RunContext,
        inventory: &Inventory,
        channels: usize,
        margin: usize,
    ) -> Result<Canvas, MosaicError> {
        let mut canvas = Canvas::for_inventory(inventory, channels, margin)?;
        info!(
            parent: ctx.span(),
            "Creating canvas of size {}x{} with {} channel(s)",
            canvas.width(),
            canvas.height(),
            channels
        );
        ctx.report_mut().canvas = Some((canvas.width(), canvas.height(), channels));

        for record in &inventory.tiles {
            let decoded = match self.source.decode(&record.path) {
                Ok(decoded) => decoded,
                Err(error) => {
                    ctx.skip_tile(&record.name, &error);
                    continue;
                }
            };

            let identifier = record.path.to_string_lossy();
            let tile = self.normalizer.normalize(ctx, &identifier, decoded.samples);

            let placement = match canvas.place(tile.view(), record.x, record.y) {
                Ok(placement) => placement,
                Err(error) => {
                    ctx.skip_tile(&record.name, &error);
                    continue;
                }
            };

            for (channel, reason) in placement.skipped() {
                ctx.skip_channel(&record.name, channel, reason);
            }
            if placement.copied_channels() > 0 {
                ctx.report_mut().tiles_placed += 1;
            }
        }

        info!(
            parent: ctx.span(),
            "Placed {} of {} tile(s)",
            ctx.report().tiles_placed,
            inventory.len()
        );
        Ok(canvas)
    }
}

// =============================================================================
// Tests
// =============================================================================

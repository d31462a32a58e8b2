//! Tile normalization.
//!
//! Every decoded tile leaves here as a `(height, width, channel)` buffer.
//! Single bands are lifted to one channel, producer-specific layouts are
//! rewritten by the quirks the tile source declares, and over-wide stacks are
//! cut to the configured channel limit.

use ndarray::{s, Array2, Array3, Axis};
use tracing::info;

use crate::io::{TileSamples, TileSource};

use super::context::RunContext;

/// Band height of the stacked-band layout.
pub const DEFAULT_BAND_HEIGHT: usize = 6;

/// Channels kept from tiles that carry more.
pub const DEFAULT_MAX_TILE_CHANNELS: usize = 6;

// =============================================================================
// Producer Quirks
// =============================================================================

/// A named layout rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuirkTransform {
    /// A single band whose rows are really `rows / band_height` bands of
    /// `band_height` rows each, stacked top to bottom. Band `b` becomes
    /// channel `b` of a `band_height`-row tile.
    UnstackBands { band_height: usize },
}

impl QuirkTransform {
    /// Apply the rewrite, or `None` when the buffer does not have the layout.
    fn apply(&self, samples: &TileSamples) -> Option<Array3<u16>> {
        match (self, samples) {
            (QuirkTransform::UnstackBands { band_height }, TileSamples::Plane(plane)) => {
                unstack_bands(plane, *band_height)
            }
            _ => None,
        }
    }
}

fn unstack_bands(plane: &Array2<u16>, band_height: usize) -> Option<Array3<u16>> {
    let (rows, width) = plane.dim();
    if band_height == 0 || rows == 0 || rows % band_height != 0 {
        return None;
    }
    let bands = rows / band_height;
    Some(Array3::from_shape_fn(
        (band_height, width, bands),
        |(row, col, band)| plane[[band * band_height + row, col]],
    ))
}

/// A layout rewrite tied to one producer's file naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerQuirk {
    pub name: &'static str,
    /// Substring of the tile path that identifies the producer's files
    pub marker: String,
    pub transform: QuirkTransform,
}

impl ProducerQuirk {
    /// Akoya `component_data` exports: six-row bands stacked into one tall band.
    pub fn akoya_component_data() -> Self {
        Self {
            name: "akoya_component_data",
            marker: "component_data".to_string(),
            transform: QuirkTransform::UnstackBands {
                band_height: DEFAULT_BAND_HEIGHT,
            },
        }
    }

    pub fn applies_to(&self, identifier: &str) -> bool {
        identifier.contains(&self.marker)
    }
}

// =============================================================================
// Normalizer
// =============================================================================

/// Brings decoded tiles into canvas layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileNormalizer {
    quirks: Vec<ProducerQuirk>,
    max_channels: usize,
}

impl TileNormalizer {
    pub fn new(quirks: Vec<ProducerQuirk>, max_channels: usize) -> Self {
        Self {
            quirks,
            max_channels,
        }
    }

    /// Normalizer using the quirks declared by `source`.
    pub fn for_source(source: &dyn TileSource, max_channels: usize) -> Self {
        Self::new(source.producer_quirks().to_vec(), max_channels)
    }

    /// Normalize one tile. `identifier` is the tile's path as text.
    ///
    /// The first matching quirk whose layout test succeeds wins; a rewritten
    /// tile is not truncated.
    pub fn normalize(
        &self,
        ctx: &mut RunContext,
        identifier: &str,
        samples: TileSamples,
    ) -> Array3<u16> {
        let (height, width, channels) = samples.dim();

        let rewritten = self
            .quirks
            .iter()
            .filter(|quirk| quirk.applies_to(identifier))
            .find_map(|quirk| quirk.transform.apply(&samples).map(|out| (quirk.name, out)));
        if let Some((quirk, out)) = rewritten {
            let (new_h, new_w, new_c) = out.dim();
            info!(
                parent: ctx.span(),
                tile = identifier,
                quirk = quirk,
                "Reshaped {}x{}x{} to {}x{}x{}",
                height,
                width,
                channels,
                new_h,
                new_w,
                new_c
            );
            ctx.report_mut().tiles_reshaped += 1;
            return out;
        }

        let stack = match samples {
            TileSamples::Plane(plane) => plane.insert_axis(Axis(2)),
            TileSamples::Stack(stack) => stack,
        };

        if channels > self.max_channels {
            info!(
                parent: ctx.span(),
                tile = identifier,
                "Limiting channels from {} to {}",
                channels,
                self.max_channels
            );
            return stack.slice_move(s![.., .., ..self.max_channels]);
        }
        stack
    }
}

impl Default for TileNormalizer {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_MAX_TILE_CHANNELS)
    }
}

// =============================================================================
// Tests
// =============================================================================

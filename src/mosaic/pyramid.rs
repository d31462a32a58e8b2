//! Resolution pyramid.
//!
//! Level 0 is the canvas. Each further level halves both dimensions (floor)
//! by point sampling: `next[r][c] = current[2r][2c]`, no averaging. Halving
//! continues while both dimensions of the current level exceed
//! [`MIN_PYRAMID_DIMENSION`].

use ndarray::{s, Array3, ArrayView3};
use tracing::info;

use super::canvas::Canvas;
use super::context::{LevelSummary, RunContext};

/// Levels no larger than this in either dimension are not reduced further.
pub const MIN_PYRAMID_DIMENSION: usize = 256;

/// One resolution of the mosaic, indexed `[row, col, channel]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidLevel {
    data: Array3<u16>,
}

impl PyramidLevel {
    pub fn new(data: Array3<u16>) -> Self {
        Self { data }
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

    pub fn view(&self) -> ArrayView3<'_, u16> {
        self.data.view()
    }
}

/// Point-sample a level down to half its size (floor).
pub fn downsample(level: ArrayView3<'_, u16>) -> Array3<u16> {
    let (height, width, _) = level.dim();
    let (new_h, new_w) = (height / 2, width / 2);
    level
        .slice(s![..2 * new_h;2, ..2 * new_w;2, ..])
        .to_owned()
}

/// Ordered pyramid, full resolution first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pyramid {
    levels: Vec<PyramidLevel>,
}

impl Pyramid {
    /// Build the pyramid for a composed canvas.
    pub fn build(ctx: &mut RunContext, canvas: Canvas) -> Self {
        let pyramid = Self::from_base(canvas.into_inner(), MIN_PYRAMID_DIMENSION);

        for (index, level) in pyramid.levels.iter().enumerate() {
            info!(
                parent: ctx.span(),
                level = index,
                "Pyramid level {}x{}",
                level.width(),
                level.height()
            );
            ctx.report_mut().levels.push(LevelSummary {
                width: level.width(),
                height: level.height(),
            });
        }
        pyramid
    }

    /// Build from a base buffer, halving while both dimensions exceed
    /// `min_dimension`.
    pub fn from_base(base: Array3<u16>, min_dimension: usize) -> Self {
        let mut levels = vec![PyramidLevel::new(base)];
        loop {
            let current = &levels[levels.len() - 1];
            if current.height() <= min_dimension || current.width() <= min_dimension {
                break;
            }
            let next = downsample(current.view());
            levels.push(PyramidLevel::new(next));
        }
        Self { levels }
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn base(&self) -> &PyramidLevel {
        &self.levels[0]
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(h: usize, w: usize, c: usize) -> Array3<u16> {
        Array3::from_shape_fn((h, w, c), |(r, col, ch)| {
            ((r * 131 + col * 7 + ch) % 65536) as u16
        })
    }

    fn dims(pyramid: &Pyramid) -> Vec<(usize, usize)> {
        pyramid
            .levels()
            .iter()
            .map(|l| (l.height(), l.width()))
            .collect()
    }

    // -------------------------------------------------------------------------
    // downsample
    // -------------------------------------------------------------------------

    #[test]
    fn test_downsample_point_samples() {
        let level = indexed(7, 9, 2);
        let half = downsample(level.view());

        assert_eq!(half.dim(), (3, 4, 2));
        for ((r, c, ch), &value) in half.indexed_iter() {
            assert_eq!(value, level[[2 * r, 2 * c, ch]]);
        }
    }

    #[test]
    fn test_downsample_does_not_average() {
        let mut level = Array3::zeros((2, 2, 1));
        level[[0, 1, 0]] = 1000;
        level[[1, 0, 0]] = 1000;
        level[[1, 1, 0]] = 1000;
        assert_eq!(downsample(level.view())[[0, 0, 0]], 0);
    }

    // -------------------------------------------------------------------------
    // Level sequence
    // -------------------------------------------------------------------------

    #[test]
    fn test_small_canvas_is_single_level() {
        let pyramid = Pyramid::from_base(indexed(20, 20, 1), MIN_PYRAMID_DIMENSION);
        assert_eq!(dims(&pyramid), vec![(20, 20)]);
        assert_eq!(pyramid.len(), 1);
    }

    #[test]
    fn test_halving_stops_at_threshold() {
        let pyramid = Pyramid::from_base(indexed(1100, 600, 1), MIN_PYRAMID_DIMENSION);
        assert_eq!(dims(&pyramid), vec![(1100, 600), (550, 300), (275, 150)]);
    }

    #[test]
    fn test_one_small_side_stops_halving() {
        let pyramid = Pyramid::from_base(indexed(256, 4000, 1), MIN_PYRAMID_DIMENSION);
        assert_eq!(pyramid.len(), 1);

        let pyramid = Pyramid::from_base(indexed(257, 4000, 1), MIN_PYRAMID_DIMENSION);
        assert_eq!(dims(&pyramid), vec![(257, 4000), (128, 2000)]);
    }

    #[test]
    fn test_levels_chain_point_samples() {
        let pyramid = Pyramid::from_base(indexed(40, 36, 3), 8);
        assert_eq!(dims(&pyramid), vec![(40, 36), (20, 18), (10, 9), (5, 4)]);

        for pair in pyramid.levels().windows(2) {
            let (prev, next) = (pair[0].data(), pair[1].data());
            for ((r, c, ch), &value) in next.indexed_iter() {
                assert_eq!(value, prev[[2 * r, 2 * c, ch]]);
            }
        }
    }

    #[test]
    fn test_build_records_levels() {
        let mut ctx = RunContext::new("test");
        let canvas = Canvas::new(600, 520, 1);
        let pyramid = Pyramid::build(&mut ctx, canvas);

        assert_eq!(pyramid.len(), 3);
        assert_eq!(
            ctx.report().levels,
            vec![
                LevelSummary { width: 520, height: 600 },
                LevelSummary { width: 260, height: 300 },
                LevelSummary { width: 130, height: 150 },
            ]
        );
        assert_eq!(pyramid.base().channels(), 1);
    }
}

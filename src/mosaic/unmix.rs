//! Linear channel unmixing.
//!
//! A precomputed `C × C` matrix maps each pixel's channel vector `v` to `M·v`,
//! clamped to the canvas sample range. Computing the matrix from reference
//! images happens elsewhere; this module only loads and applies it.

use std::path::Path;

use ndarray::{Array2, Array3, Axis};
use serde::Deserialize;

use crate::error::MosaicError;

/// Square mixing matrix with optional channel labels.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmixingMatrix {
    channel_names: Vec<String>,
    matrix: Array2<f64>,
}

#[derive(Debug, Deserialize)]
struct MatrixFile {
    #[serde(default)]
    channel_names: Vec<String>,
    matrix: Vec<Vec<f64>>,
}

impl UnmixingMatrix {
    /// Build from row vectors. Rows must form a non-empty square of finite values.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, MosaicError> {
        let size = rows.len();
        if size == 0 {
            return Err(MosaicError::UnmixingMatrix("matrix is empty".to_string()));
        }
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != size) {
            return Err(MosaicError::UnmixingMatrix(format!(
                "row {} has {} entries, expected {}",
                index,
                row.len(),
                size
            )));
        }
        let values: Vec<f64> = rows.into_iter().flatten().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MosaicError::UnmixingMatrix(
                "matrix contains non-finite values".to_string(),
            ));
        }
        let matrix = Array2::from_shape_vec((size, size), values)
            .map_err(|e| MosaicError::UnmixingMatrix(e.to_string()))?;

        Ok(Self {
            channel_names: Vec::new(),
            matrix,
        })
    }

    /// Parse `{ "channel_names": [...], "matrix": [[...], ...] }`.
    pub fn from_json_str(json: &str) -> Result<Self, MosaicError> {
        let file: MatrixFile =
            serde_json::from_str(json).map_err(|e| MosaicError::UnmixingMatrix(e.to_string()))?;
        let mut unmixing = Self::from_rows(file.matrix)?;
        if !file.channel_names.is_empty() && file.channel_names.len() != unmixing.size() {
            return Err(MosaicError::UnmixingMatrix(format!(
                "{} channel names for a {}x{} matrix",
                file.channel_names.len(),
                unmixing.size(),
                unmixing.size()
            )));
        }
        unmixing.channel_names = file.channel_names;
        Ok(unmixing)
    }

    pub fn from_path(path: &Path) -> Result<Self, MosaicError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            MosaicError::UnmixingMatrix(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Matrix for `out_i = v_i - coefficient × v_af` on every channel but the
    /// autofluorescence channel itself, which passes through.
    pub fn autofluorescence_subtraction(
        channels: usize,
        af_channel: usize,
        coefficient: f64,
    ) -> Result<Self, MosaicError> {
        if af_channel >= channels {
            return Err(MosaicError::UnmixingMatrix(format!(
                "autofluorescence channel {} is outside {} channel(s)",
                af_channel, channels
            )));
        }
        let mut matrix = Array2::<f64>::eye(channels);
        for row in (0..channels).filter(|&row| row != af_channel) {
            matrix[[row, af_channel]] = -coefficient;
        }
        Ok(Self {
            channel_names: Vec::new(),
            matrix,
        })
    }

    /// Number of channels the matrix mixes.
    pub fn size(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Unmix a `[row, col, channel]` buffer in place.
    pub fn apply(&self, data: &mut Array3<u16>) -> Result<(), MosaicError> {
        let channels = data.dim().2;
        if channels != self.size() {
            return Err(MosaicError::UnmixingMatrix(format!(
                "matrix is {}x{} but the image has {} channel(s)",
                self.size(),
                self.size(),
                channels
            )));
        }

        let mut mixed = vec![0.0f64; channels];
        for mut pixel in data.lanes_mut(Axis(2)) {
            for (out, row) in mixed.iter_mut().zip(self.matrix.rows()) {
                *out = row
                    .iter()
                    .zip(pixel.iter())
                    .map(|(&m, &v)| m * f64::from(v))
                    .sum();
            }
            for (dst, &value) in pixel.iter_mut().zip(&mixed) {
                *dst = value.clamp(0.0, f64::from(u16::MAX)) as u16;
            }
        }
        Ok(())
    }
}

//! Per-slot feature normalization

use crate::dataset::{Column, Frame};
use crate::error::{KolosalError, Result};
use crate::preprocessing::ColumnPair;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Normalization mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizerMode {
    /// (x - min) / (max - min)
    #[default]
    MinMax,
    /// (x - mean) / std
    MeanVariance,
}

impl FromStr for NormalizerMode {
    type Err = KolosalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "minmax" => Ok(NormalizerMode::MinMax),
            "meanvariance" | "standard" => Ok(NormalizerMode::MeanVariance),
            _ => Err(KolosalError::invalid_parameter("Mode", s, "expected MinMax or MeanVariance")),
        }
    }
}

/// Parameters for one fitted slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SlotParams {
    offset: f64,
    scale: f64,
}

/// Feature normalizer over a scalar or vector column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub column: ColumnPair,
    pub mode: NormalizerMode,
    params: Vec<SlotParams>,
    is_fitted: bool,
}

impl Normalizer {
    pub fn new(column: ColumnPair, mode: NormalizerMode) -> Self {
        Self {
            column,
            mode,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    fn rows(&self, frame: &Frame) -> Result<Vec<Vec<f64>>> {
        let source = frame.column(&self.column.input)?;
        match source {
            Column::Scalar { .. } | Column::Vector { .. } => source.numeric_rows(),
            other => Err(KolosalError::DataError(format!(
                "cannot normalize {} column '{}'",
                other.kind(),
                self.column.input
            ))),
        }
    }

    fn compute_params(&self, values: &[f64]) -> SlotParams {
        if values.is_empty() {
            return SlotParams { offset: 0.0, scale: 1.0 };
        }
        let (offset, spread) = match self.mode {
            NormalizerMode::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
            NormalizerMode::MeanVariance => {
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                (mean, var.sqrt())
            }
        };
        // Constant slots only get shifted
        let scale = if spread > f64::EPSILON { spread } else { 1.0 };
        SlotParams { offset, scale }
    }

    /// Fit the normalizer to the data
    pub fn fit(&mut self, frame: &Frame) -> Result<&mut Self> {
        let rows = self.rows(frame)?;
        let width = frame.column(&self.column.input)?.width();
        self.params = (0..width)
            .map(|j| {
                let present: Vec<f64> = rows.iter().map(|r| r[j]).filter(|v| !v.is_nan()).collect();
                self.compute_params(&present)
            })
            .collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data. Missing values stay missing.
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }
        let source = frame.column(&self.column.input)?;
        if source.width() != self.params.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("width {}", self.params.len()),
                actual: format!("width {}", source.width()),
            });
        }
        let rows: Vec<Vec<f64>> = self
            .rows(frame)?
            .into_iter()
            .map(|r| {
                r.into_iter()
                    .zip(&self.params)
                    .map(|(v, p)| (v - p.offset) / p.scale)
                    .collect()
            })
            .collect();
        let normalized = match source {
            Column::Scalar { .. } => Column::scalar(rows.into_iter().map(|r| r[0]).collect()),
            _ => Column::vector(rows)?,
        };
        let mut out = frame.clone();
        out.add_column(self.column.output.clone(), normalized)?;
        Ok(out)
    }
}

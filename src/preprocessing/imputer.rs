//! Missing value indication and replacement

use crate::dataset::{Column, Frame};
use crate::error::{KolosalError, Result};
use crate::preprocessing::ColumnPair;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Emits 1.0 where the input is missing and 0.0 elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueIndicator {
    pub columns: Vec<ColumnPair>,
}

impl MissingValueIndicator {
    pub fn new(columns: Vec<ColumnPair>) -> Self {
        Self { columns }
    }

    fn flag(missing: bool) -> f64 {
        if missing {
            1.0
        } else {
            0.0
        }
    }

    fn indicate(column: &Column) -> Result<Column> {
        Ok(match column {
            Column::Scalar { values } => Column::scalar(values.iter().map(|v| Self::flag(v.is_nan())).collect()),
            Column::Vector { rows, .. } => Column::vector(
                rows.iter()
                    .map(|r| r.iter().map(|v| Self::flag(v.is_nan())).collect())
                    .collect(),
            )?,
            Column::Text { values } => Column::scalar(values.iter().map(|v| Self::flag(v.is_none())).collect()),
            Column::Key { values, .. } => Column::scalar(values.iter().map(|&k| Self::flag(k == 0)).collect()),
        })
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let mut out = frame.clone();
        for pair in &self.columns {
            let indicator = Self::indicate(frame.column(&pair.input)?)?;
            out.add_column(pair.output.clone(), indicator)?;
        }
        Ok(out)
    }
}

/// Replacement value policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplacementMode {
    /// Replace with 0
    #[default]
    DefaultValue,
    Mean,
    Minimum,
    Maximum,
}

impl FromStr for ReplacementMode {
    type Err = KolosalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "defaultvalue" | "default" => Ok(ReplacementMode::DefaultValue),
            "mean" => Ok(ReplacementMode::Mean),
            "minimum" | "min" => Ok(ReplacementMode::Minimum),
            "maximum" | "max" => Ok(ReplacementMode::Maximum),
            _ => Err(KolosalError::invalid_parameter(
                "ReplacementMode",
                s,
                "expected DefaultValue, Mean, Minimum or Maximum",
            )),
        }
    }
}

/// Replaces missing numeric values with a per-slot statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingValueReplacer {
    pub columns: Vec<ColumnPair>,
    pub mode: ReplacementMode,
    replacements: HashMap<String, Vec<f64>>,
    is_fitted: bool,
}

impl MissingValueReplacer {
    pub fn new(columns: Vec<ColumnPair>, mode: ReplacementMode) -> Self {
        Self {
            columns,
            mode,
            replacements: HashMap::new(),
            is_fitted: false,
        }
    }

    fn numeric_rows(frame: &Frame, name: &str) -> Result<Vec<Vec<f64>>> {
        match frame.column(name)? {
            c @ (Column::Scalar { .. } | Column::Vector { .. }) => c.numeric_rows(),
            other => Err(KolosalError::DataError(format!(
                "cannot replace missing values in {} column '{}'",
                other.kind(),
                name
            ))),
        }
    }

    fn statistic(&self, values: impl Iterator<Item = f64>) -> f64 {
        let present: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
        if present.is_empty() {
            return 0.0;
        }
        match self.mode {
            ReplacementMode::DefaultValue => 0.0,
            ReplacementMode::Mean => present.iter().sum::<f64>() / present.len() as f64,
            ReplacementMode::Minimum => present.iter().copied().fold(f64::INFINITY, f64::min),
            ReplacementMode::Maximum => present.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    pub fn fit(&mut self, frame: &Frame) -> Result<&mut Self> {
        self.replacements.clear();
        for pair in &self.columns {
            let rows = Self::numeric_rows(frame, &pair.input)?;
            let width = frame.column(&pair.input)?.width();
            let slots = (0..width)
                .map(|j| self.statistic(rows.iter().map(|r| r[j])))
                .collect();
            self.replacements.insert(pair.input.clone(), slots);
        }
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }
        let mut out = frame.clone();
        for pair in &self.columns {
            let slots = self
                .replacements
                .get(&pair.input)
                .ok_or_else(|| KolosalError::FeatureNotFound(pair.input.clone()))?;
            let source = frame.column(&pair.input)?;
            if source.width() != slots.len() {
                return Err(KolosalError::ShapeError {
                    expected: format!("width {}", slots.len()),
                    actual: format!("width {}", source.width()),
                });
            }
            let rows: Vec<Vec<f64>> = Self::numeric_rows(frame, &pair.input)?
                .into_iter()
                .map(|r| {
                    r.into_iter()
                        .zip(slots)
                        .map(|(v, fill)| if v.is_nan() { *fill } else { v })
                        .collect()
                })
                .collect();
            let replaced = match source {
                Column::Scalar { .. } => Column::scalar(rows.into_iter().map(|r| r[0]).collect()),
                _ => Column::vector(rows)?,
            };
            out.add_column(pair.output.clone(), replaced)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new()
            .with_column("a", Column::scalar(vec![1.0, f64::NAN, 5.0]))
            .unwrap()
            .with_column("t", Column::text(vec![Some("x"), None, Some("y")]))
            .unwrap()
    }

    #[test]
    fn test_indicate() {
        let out = MissingValueIndicator::new(vec![ColumnPair::new("a", "a_missing"), ColumnPair::new("t", "t_missing")])
            .transform(&frame())
            .unwrap();
        assert_eq!(out.column("a_missing").unwrap().scalar_values().unwrap(), vec![0.0, 1.0, 0.0]);
        assert_eq!(out.column("t_missing").unwrap().scalar_values().unwrap(), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_replace_modes() {
        for (mode, expected) in [
            (ReplacementMode::DefaultValue, 0.0),
            (ReplacementMode::Mean, 3.0),
            (ReplacementMode::Minimum, 1.0),
            (ReplacementMode::Maximum, 5.0),
        ] {
            let mut replacer = MissingValueReplacer::new(vec![ColumnPair::new("a", "a")], mode);
            let out = replacer.fit(&frame()).unwrap().transform(&frame()).unwrap();
            assert_eq!(out.column("a").unwrap().scalar_values().unwrap()[1], expected);
        }
    }

    #[test]
    fn test_replace_requires_fit() {
        let replacer = MissingValueReplacer::new(vec![ColumnPair::new("a", "a")], ReplacementMode::Mean);
        assert!(matches!(replacer.transform(&frame()), Err(KolosalError::ModelNotFitted)));
    }

    #[test]
    fn test_replace_rejects_text() {
        let mut replacer = MissingValueReplacer::new(vec![ColumnPair::new("t", "t")], ReplacementMode::Mean);
        assert!(replacer.fit(&frame()).is_err());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Mean".parse::<ReplacementMode>().unwrap(), ReplacementMode::Mean);
        assert!("median".parse::<ReplacementMode>().is_err());
    }
}

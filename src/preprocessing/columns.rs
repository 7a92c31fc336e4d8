//! Stateless column operations: concatenate, copy, convert

use crate::dataset::{Column, Frame};
use crate::error::{KolosalError, Result};
use crate::preprocessing::ColumnPair;
use serde::{Deserialize, Serialize};

/// Concatenates numeric columns into one vector column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConcatenator {
    pub inputs: Vec<String>,
    pub output: String,
}

impl ColumnConcatenator {
    pub fn new(inputs: Vec<String>, output: impl Into<String>) -> Self {
        Self {
            inputs,
            output: output.into(),
        }
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        if self.inputs.is_empty() {
            return Err(KolosalError::InvalidInput("nothing to concatenate".to_string()));
        }
        let sources = self
            .inputs
            .iter()
            .map(|name| frame.column(name)?.numeric_rows())
            .collect::<Result<Vec<_>>>()?;

        let rows = (0..frame.row_count())
            .map(|i| sources.iter().flat_map(|s| s[i].iter().copied()).collect())
            .collect();

        let mut out = frame.clone();
        out.add_column(self.output.clone(), Column::vector(rows)?)?;
        Ok(out)
    }
}

/// Copies a column under a new name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCopier {
    pub column: ColumnPair,
}

impl ColumnCopier {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            column: ColumnPair::new(input, output),
        }
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let source = frame.column(&self.column.input)?.clone();
        let mut out = frame.clone();
        out.add_column(self.column.output.clone(), source)?;
        Ok(out)
    }
}

/// Converts columns to floating point. Text is parsed, keys become their
/// index, anything unparseable becomes missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeConverter {
    pub columns: Vec<ColumnPair>,
}

impl TypeConverter {
    pub fn new(columns: Vec<ColumnPair>) -> Self {
        Self { columns }
    }

    fn parse(text: &str) -> f64 {
        let trimmed = text.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => 1.0,
            "false" => 0.0,
            _ => trimmed.parse::<f64>().unwrap_or(f64::NAN),
        }
    }

    pub fn convert(column: &Column) -> Column {
        match column {
            Column::Scalar { .. } | Column::Vector { .. } => column.clone(),
            Column::Text { values } => Column::scalar(
                values
                    .iter()
                    .map(|v| v.as_deref().map(Self::parse).unwrap_or(f64::NAN))
                    .collect(),
            ),
            Column::Key { values, .. } => Column::scalar(
                values
                    .iter()
                    .map(|&k| if k == 0 { f64::NAN } else { f64::from(k) })
                    .collect(),
            ),
        }
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let mut out = frame.clone();
        for pair in &self.columns {
            let converted = Self::convert(frame.column(&pair.input)?);
            out.add_column(pair.output.clone(), converted)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new()
            .with_column("a", Column::scalar(vec![1.0, 2.0]))
            .unwrap()
            .with_column("b", Column::vector(vec![vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap())
            .unwrap()
            .with_column("t", Column::text(vec![Some("1.5"), Some("yes")]))
            .unwrap()
    }

    #[test]
    fn test_concatenate() {
        let out = ColumnConcatenator::new(vec!["a".into(), "b".into()], "Features")
            .transform(&frame())
            .unwrap();
        let rows = out.column("Features").unwrap().numeric_rows().unwrap();
        assert_eq!(rows, vec![vec![1.0, 3.0, 4.0], vec![2.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_concatenate_rejects_text() {
        let result = ColumnConcatenator::new(vec!["a".into(), "t".into()], "F").transform(&frame());
        assert!(matches!(result, Err(KolosalError::DataError(_))));
    }

    #[test]
    fn test_copy() {
        let out = ColumnCopier::new("a", "a2").transform(&frame()).unwrap();
        assert_eq!(out.column("a2").unwrap(), out.column("a").unwrap());
    }

    #[test]
    fn test_convert_text() {
        let out = TypeConverter::new(vec![ColumnPair::new("t", "t_num")])
            .transform(&frame())
            .unwrap();
        let values = out.column("t_num").unwrap().scalar_values().unwrap();
        assert_eq!(values[0], 1.5);
        assert!(values[1].is_nan());
    }
}

//! Minimal columnar frame for plaintext data
//!
//! Columns are named and ordered. Scalar and vector columns use `NaN` for
//! missing values; in JSON those are written as `null`.

use crate::error::{KolosalError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values: Vec<Option<f64>> = Vec::deserialize(deserializer)?;
        Ok(values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

mod nan_rows_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(rows: &[Vec<f64>], serializer: S) -> Result<S::Ok, S::Error> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_nan() { None } else { Some(*v) })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let rows: Vec<Vec<Option<f64>>> = Vec::deserialize(deserializer)?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect())
    }
}

/// Column storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Column {
    /// One number per row
    Scalar {
        #[serde(with = "nan_as_null")]
        values: Vec<f64>,
    },
    /// Fixed-width numeric vector per row
    Vector {
        width: usize,
        #[serde(with = "nan_rows_as_null")]
        rows: Vec<Vec<f64>>,
    },
    /// Free text, `None` is missing
    Text { values: Vec<Option<String>> },
    /// Categorical keys, 1-based; 0 is missing
    Key { values: Vec<u32>, cardinality: u32 },
}

impl Column {
    pub fn scalar(values: Vec<f64>) -> Self {
        Column::Scalar { values }
    }

    /// Build a vector column, checking that every row has the same width
    pub fn vector(rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(KolosalError::ShapeError {
                expected: format!("{} values in every row", width),
                actual: format!("{} values in row {}", row.len(), i),
            });
        }
        Ok(Column::Vector { width, rows })
    }

    pub fn text<S: Into<String>>(values: Vec<Option<S>>) -> Self {
        Column::Text {
            values: values.into_iter().map(|v| v.map(Into::into)).collect(),
        }
    }

    pub fn key(values: Vec<u32>, cardinality: u32) -> Self {
        Column::Key { values, cardinality }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            Column::Scalar { values } => values.len(),
            Column::Vector { rows, .. } => rows.len(),
            Column::Text { values } => values.len(),
            Column::Key { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values per row once expressed numerically
    pub fn width(&self) -> usize {
        match self {
            Column::Vector { width, .. } => *width,
            _ => 1,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Column::Scalar { .. } => "scalar",
            Column::Vector { .. } => "vector",
            Column::Text { .. } => "text",
            Column::Key { .. } => "key",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Column::Text { .. })
    }

    /// Numeric row `i`. Keys map to their index, missing keys to `NaN`.
    pub fn numeric_row(&self, i: usize) -> Option<Vec<f64>> {
        match self {
            Column::Scalar { values } => values.get(i).map(|v| vec![*v]),
            Column::Vector { rows, .. } => rows.get(i).cloned(),
            Column::Key { values, .. } => values
                .get(i)
                .map(|&k| vec![if k == 0 { f64::NAN } else { f64::from(k) }]),
            Column::Text { .. } => None,
        }
    }

    /// All rows as numeric vectors
    pub fn numeric_rows(&self) -> Result<Vec<Vec<f64>>> {
        if !self.is_numeric() {
            return Err(KolosalError::DataError(format!(
                "{} column cannot be used as numeric features",
                self.kind()
            )));
        }
        Ok((0..self.len()).filter_map(|i| self.numeric_row(i)).collect())
    }

    /// One scalar per row. Vector columns must have width 1.
    pub fn scalar_values(&self) -> Result<Vec<f64>> {
        if self.width() != 1 || !self.is_numeric() {
            return Err(KolosalError::DataError(format!(
                "expected a scalar column, found {} of width {}",
                self.kind(),
                self.width()
            )));
        }
        Ok(self.numeric_rows()?.into_iter().map(|r| r[0]).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NamedColumn {
    name: String,
    column: Column,
}

/// Ordered set of equally long named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<NamedColumn>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Frame::add_column`]
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.add_column(name, column)?;
        Ok(self)
    }

    /// Add a column, replacing any column with the same name
    pub fn add_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        let others = self.columns.iter().filter(|c| c.name != name).count();
        if others > 0 && column.len() != self.row_count_excluding(&name) {
            return Err(KolosalError::ShapeError {
                expected: format!("{} rows", self.row_count_excluding(&name)),
                actual: format!("{} rows in column '{}'", column.len(), name),
            });
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.column = column,
            None => self.columns.push(NamedColumn { name, column }),
        }
        Ok(())
    }

    fn row_count_excluding(&self, name: &str) -> usize {
        self.columns
            .iter()
            .find(|c| c.name != name)
            .map(|c| c.column.len())
            .unwrap_or(0)
    }

    pub fn remove_column(&mut self, name: &str) -> Result<Column> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| KolosalError::FeatureNotFound(name.to_string()))?;
        Ok(self.columns.remove(idx).column)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.column)
            .ok_or_else(|| KolosalError::FeatureNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|c| (c.name.as_str(), &c.column))
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.column.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Numeric features of one column as a row-major matrix
    pub fn feature_matrix(&self, name: &str) -> Result<Array2<f64>> {
        let column = self.column(name)?;
        let rows = column.numeric_rows()?;
        let width = column.width();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((self.row_count(), width), flat)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let frame: Frame = serde_json::from_reader(BufReader::new(file))?;
        frame.check_consistent()?;
        Ok(frame)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    fn check_consistent(&self) -> Result<()> {
        let rows = self.row_count();
        for c in &self.columns {
            if c.column.len() != rows {
                return Err(KolosalError::ShapeError {
                    expected: format!("{} rows", rows),
                    actual: format!("{} rows in column '{}'", c.column.len(), c.name),
                });
            }
            if let Column::Vector { width, rows } = &c.column {
                if rows.iter().any(|r| r.len() != *width) {
                    return Err(KolosalError::ShapeError {
                        expected: format!("width {}", width),
                        actual: format!("ragged rows in column '{}'", c.name),
                    });
                }
            }
        }
        Ok(())
    }
}

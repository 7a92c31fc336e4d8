//! Plaintext linear binary classifier produced by materialization

use crate::error::{KolosalError, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Provenance of a materialized model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trainer: String,
    pub trained_at: DateTime<Utc>,
    pub n_features: usize,
    pub l2_regularization: f64,
    pub l1_regularization: f64,
    pub epochs: usize,
    pub converged: bool,
}

/// Logistic-link linear model: `p(y=1|x) = sigmoid(w·x + b)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearBinaryModel {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
    pub metadata: Option<ModelMetadata>,
}

impl LinearBinaryModel {
    pub fn new(coefficients: Array1<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.coefficients.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} features", self.coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Raw margins `w·x + b`
    pub fn predict_margin(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    /// Predict probabilities of the positive class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_margin(x)?.mapv(Self::sigmoid))
    }

    /// Predict class labels (1.0 / 0.0)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Accuracy against labels where positive values are the positive class
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        if x.nrows() != y.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if y.is_empty() {
            return Err(KolosalError::DataError("cannot score an empty dataset".to_string()));
        }
        let y_pred = self.predict(x)?;
        let correct = y_pred
            .iter()
            .zip(y.iter())
            .filter(|(pred, actual)| (**pred > 0.5) == (**actual > 0.0))
            .count();
        Ok(correct as f64 / y.len() as f64)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predict() {
        let model = LinearBinaryModel::new(array![1.0, -1.0], 0.5);
        let x = array![[2.0, 0.0], [0.0, 2.0]];
        assert_eq!(model.predict_margin(&x).unwrap(), array![2.5, -1.5]);
        assert_eq!(model.predict(&x).unwrap(), array![1.0, 0.0]);
        let p = model.predict_proba(&x).unwrap();
        assert!(p[0] > 0.9 && p[1] < 0.2);
    }

    #[test]
    fn test_score_accepts_signed_labels() {
        let model = LinearBinaryModel::new(array![1.0], 0.0);
        let x = array![[1.0], [-1.0], [2.0]];
        assert_eq!(model.score(&x, &array![1.0, -1.0, 1.0]).unwrap(), 1.0);
        assert_eq!(model.score(&x, &array![1.0, 0.0, 0.0]).unwrap(), 2.0 / 3.0);
    }

    #[test]
    fn test_width_mismatch() {
        let model = LinearBinaryModel::new(array![1.0, 2.0], 0.0);
        assert!(model.predict(&array![[1.0]]).is_err());
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = LinearBinaryModel::new(array![0.25, -0.5], 1.0);
        model.save(&path).unwrap();
        assert_eq!(LinearBinaryModel::load(&path).unwrap(), model);
    }
}

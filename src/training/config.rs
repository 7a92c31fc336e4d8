//! Options for the encrypted SDCA trainer

use crate::error::{KolosalError, Result};
use crate::utils::ParallelConfig;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Default column names
pub const DEFAULT_LABEL_COLUMN: &str = "Label";
pub const DEFAULT_FEATURE_COLUMN: &str = "Features";
pub const DEFAULT_ENCRYPTED_FEATURE_COLUMN: &str = "EncryptedFeatures";

/// Default number of passes over the data
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// What to do when a weight ciphertext's noise budget drops below the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoisePolicy {
    /// Fail with `NoiseBudgetExhausted`
    #[default]
    Abort,
    /// Re-encrypt the weight ciphertext through the provider and continue
    Refresh,
}

/// Hyperparameters and column bindings for encrypted SDCA logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptedSdcaOptions {
    pub label_column: String,
    /// Plaintext feature column the encrypted column was produced from
    pub feature_column: String,
    pub encrypted_feature_column: String,
    pub example_weight_column: Option<String>,
    /// L2 strength; `None` picks `max(1e-6, 1/n)`
    pub l2_regularization: Option<f64>,
    /// L1 strength, applied as soft-thresholding when the model is decrypted
    pub l1_regularization: Option<f64>,
    /// Maximum passes over the data
    pub maximum_number_of_iterations: Option<usize>,
    /// Stop once every dual step of an epoch is smaller than this
    pub convergence_tolerance: f64,
    /// Minimum noise budget, in bits, any ciphertext may reach
    pub noise_budget_floor: u32,
    pub noise_policy: NoisePolicy,
    pub shuffle: bool,
    pub seed: u64,
    pub parallel: ParallelConfig,
}

impl Default for EncryptedSdcaOptions {
    fn default() -> Self {
        Self {
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            feature_column: DEFAULT_FEATURE_COLUMN.to_string(),
            encrypted_feature_column: DEFAULT_ENCRYPTED_FEATURE_COLUMN.to_string(),
            example_weight_column: None,
            l2_regularization: None,
            l1_regularization: None,
            maximum_number_of_iterations: None,
            convergence_tolerance: 1e-4,
            noise_budget_floor: 10,
            noise_policy: NoisePolicy::Abort,
            shuffle: true,
            seed: 42,
            parallel: ParallelConfig::default(),
        }
    }
}

impl EncryptedSdcaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label_column(mut self, name: impl Into<String>) -> Self {
        self.label_column = name.into();
        self
    }

    pub fn with_feature_column(mut self, name: impl Into<String>) -> Self {
        self.feature_column = name.into();
        self
    }

    pub fn with_encrypted_feature_column(mut self, name: impl Into<String>) -> Self {
        self.encrypted_feature_column = name.into();
        self
    }

    pub fn with_example_weight_column(mut self, name: impl Into<String>) -> Self {
        self.example_weight_column = Some(name.into());
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2_regularization = Some(l2);
        self
    }

    pub fn with_l1(mut self, l1: f64) -> Self {
        self.l1_regularization = Some(l1);
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.maximum_number_of_iterations = Some(n);
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.convergence_tolerance = tol;
        self
    }

    pub fn with_noise_budget_floor(mut self, bits: u32) -> Self {
        self.noise_budget_floor = bits;
        self
    }

    pub fn with_noise_policy(mut self, policy: NoisePolicy) -> Self {
        self.noise_policy = policy;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Effective L2 strength for `n` examples
    pub fn resolved_l2(&self, n: usize) -> f64 {
        self.l2_regularization
            .unwrap_or_else(|| (1.0 / n.max(1) as f64).max(1e-6))
    }

    pub fn resolved_l1(&self) -> f64 {
        self.l1_regularization.unwrap_or(0.0)
    }

    pub fn resolved_max_iterations(&self) -> usize {
        self.maximum_number_of_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(l2) = self.l2_regularization {
            if !l2.is_finite() || l2 <= 0.0 {
                return Err(KolosalError::invalid_parameter("l2_regularization", l2, "must be positive"));
            }
        }
        if let Some(l1) = self.l1_regularization {
            if !l1.is_finite() || l1 < 0.0 {
                return Err(KolosalError::invalid_parameter("l1_regularization", l1, "must be non-negative"));
            }
        }
        if self.maximum_number_of_iterations == Some(0) {
            return Err(KolosalError::invalid_parameter(
                "maximum_number_of_iterations",
                0,
                "must be positive",
            ));
        }
        if !self.convergence_tolerance.is_finite() || self.convergence_tolerance < 0.0 {
            return Err(KolosalError::invalid_parameter(
                "convergence_tolerance",
                self.convergence_tolerance,
                "must be non-negative",
            ));
        }
        for (name, value) in [
            ("label_column", &self.label_column),
            ("encrypted_feature_column", &self.encrypted_feature_column),
        ] {
            if value.is_empty() {
                return Err(KolosalError::invalid_parameter(name, "\"\"", "column name must not be empty"));
            }
        }
        self.parallel.validate()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let options: Self = serde_json::from_reader(BufReader::new(file))?;
        options.validate()?;
        Ok(options)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = EncryptedSdcaOptions::default();
        assert_eq!(opts.label_column, "Label");
        assert_eq!(opts.resolved_max_iterations(), 20);
        assert_eq!(opts.resolved_l1(), 0.0);
        assert!((opts.resolved_l2(100) - 0.01).abs() < 1e-12);
        assert_eq!(opts.resolved_l2(10_000_000), 1e-6);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        assert!(EncryptedSdcaOptions::new().with_l2(0.0).validate().is_err());
        assert!(EncryptedSdcaOptions::new().with_l1(-1.0).validate().is_err());
        assert!(EncryptedSdcaOptions::new().with_max_iterations(0).validate().is_err());
        assert!(EncryptedSdcaOptions::new().with_label_column("").validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: EncryptedSdcaOptions =
            serde_json::from_str(r#"{"l2_regularization": 0.5, "noise_policy": "refresh"}"#).unwrap();
        assert_eq!(opts.l2_regularization, Some(0.5));
        assert_eq!(opts.noise_policy, NoisePolicy::Refresh);
        assert_eq!(opts.seed, 42);
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        let opts = EncryptedSdcaOptions::new().with_l1(0.1).with_seed(7);
        opts.to_json_file(&path).unwrap();
        assert_eq!(EncryptedSdcaOptions::from_json_file(&path).unwrap(), opts);
    }
}

//! Encrypted columns and the training feature store

use crate::dataset::frame::Frame;
use crate::encryption::CiphertextBundle;
use crate::error::{KolosalError, Result};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A column of encrypted feature vectors, one bundle per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedColumn<C> {
    /// Declared length of every encoded vector
    pub vector_length: usize,
    pub rows: Vec<CiphertextBundle<C>>,
}

impl<C> EncryptedColumn<C> {
    pub fn new(vector_length: usize, rows: Vec<CiphertextBundle<C>>) -> Self {
        Self { vector_length, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Plaintext frame plus named encrypted columns of the same row count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedFrame<C> {
    plain: Frame,
    encrypted: BTreeMap<String, EncryptedColumn<C>>,
}

impl<C> From<Frame> for EncryptedFrame<C> {
    fn from(plain: Frame) -> Self {
        Self {
            plain,
            encrypted: BTreeMap::new(),
        }
    }
}

impl<C> EncryptedFrame<C> {
    pub fn new(plain: Frame) -> Self {
        Self::from(plain)
    }

    pub fn plain(&self) -> &Frame {
        &self.plain
    }

    pub fn plain_mut(&mut self) -> &mut Frame {
        &mut self.plain
    }

    pub fn row_count(&self) -> usize {
        if self.plain.column_count() > 0 {
            self.plain.row_count()
        } else {
            self.encrypted.values().next().map(|c| c.len()).unwrap_or(0)
        }
    }

    /// Add or replace an encrypted column
    pub fn add_encrypted_column(&mut self, name: impl Into<String>, column: EncryptedColumn<C>) -> Result<()> {
        let name = name.into();
        let has_rows = self.plain.column_count() > 0 || self.encrypted.keys().any(|k| *k != name);
        if has_rows && column.len() != self.row_count() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} rows", self.row_count()),
                actual: format!("{} rows in encrypted column '{}'", column.len(), name),
            });
        }
        self.encrypted.insert(name, column);
        Ok(())
    }

    pub fn with_encrypted_column(mut self, name: impl Into<String>, column: EncryptedColumn<C>) -> Result<Self> {
        self.add_encrypted_column(name, column)?;
        Ok(self)
    }

    pub fn encrypted_column(&self, name: &str) -> Result<&EncryptedColumn<C>> {
        self.encrypted
            .get(name)
            .ok_or_else(|| KolosalError::FeatureNotFound(name.to_string()))
    }

    pub fn encrypted_column_names(&self) -> Vec<&str> {
        self.encrypted.keys().map(String::as_str).collect()
    }

    pub fn into_parts(self) -> (Frame, BTreeMap<String, EncryptedColumn<C>>) {
        (self.plain, self.encrypted)
    }
}

/// One training example: encrypted features with plaintext label and weight
#[derive(Debug, Clone)]
pub struct TrainingExample<C> {
    pub features: CiphertextBundle<C>,
    pub label: f64,
    pub weight: f64,
}

impl<C> TrainingExample<C> {
    /// Label mapped to {-1, +1}; positive labels are the positive class
    pub fn signed_label(&self) -> f64 {
        if self.label > 0.0 {
            1.0
        } else {
            -1.0
        }
    }
}

/// Insertion-ordered store of training examples
#[derive(Debug, Clone)]
pub struct EncryptedFeatureStore<C> {
    examples: Vec<TrainingExample<C>>,
    vector_length: Option<usize>,
}

impl<C> Default for EncryptedFeatureStore<C> {
    fn default() -> Self {
        Self {
            examples: Vec::new(),
            vector_length: None,
        }
    }
}

impl<C: Clone> EncryptedFeatureStore<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble examples from an encrypted feature column, a plaintext label
    /// column and an optional plaintext weight column
    pub fn from_columns(
        frame: &EncryptedFrame<C>,
        features: &str,
        label: &str,
        weight: Option<&str>,
    ) -> Result<Self> {
        let column = frame.encrypted_column(features)?;
        let labels = frame.plain().column(label)?.scalar_values()?;
        let weights = match weight {
            Some(name) => Some(frame.plain().column(name)?.scalar_values()?),
            None => None,
        };

        if labels.len() != column.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} labels", column.len()),
                actual: format!("{} labels", labels.len()),
            });
        }

        let mut store = Self {
            examples: Vec::with_capacity(column.len()),
            vector_length: Some(column.vector_length),
        };
        for (i, bundle) in column.rows.iter().enumerate() {
            let weight = weights.as_ref().map(|w| w[i]).unwrap_or(1.0);
            store.push(TrainingExample {
                features: bundle.clone(),
                label: labels[i],
                weight,
            })?;
        }
        Ok(store)
    }

    /// Append an example; labels must be finite, weights finite and non-negative
    pub fn push(&mut self, example: TrainingExample<C>) -> Result<()> {
        let index = self.examples.len();
        if !example.label.is_finite() {
            return Err(KolosalError::DataError(format!("label of example {} is missing", index)));
        }
        if !example.weight.is_finite() || example.weight < 0.0 {
            return Err(KolosalError::DataError(format!(
                "weight of example {} must be finite and non-negative, got {}",
                index, example.weight
            )));
        }
        self.examples.push(example);
        Ok(())
    }
}

impl<C> EncryptedFeatureStore<C> {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn example(&self, index: usize) -> Option<&TrainingExample<C>> {
        self.examples.get(index)
    }

    pub fn examples(&self) -> &[TrainingExample<C>] {
        &self.examples
    }

    /// Vector length declared by the source column, if any
    pub fn declared_vector_length(&self) -> Option<usize> {
        self.vector_length
    }

    /// Check every bundle against the expected length and chunk count
    pub fn validate_dimension(&self, expected: usize, expected_chunks: usize) -> Result<()> {
        for (i, example) in self.examples.iter().enumerate() {
            if example.features.len() != expected {
                return Err(KolosalError::DimensionMismatch {
                    location: format!("example {}", i),
                    expected,
                    actual: example.features.len(),
                });
            }
            if example.features.chunk_count() != expected_chunks {
                return Err(KolosalError::DimensionMismatch {
                    location: format!("ciphertext chunks of example {}", i),
                    expected: expected_chunks,
                    actual: example.features.chunk_count(),
                });
            }
        }
        Ok(())
    }

    /// Visit order for one epoch
    pub fn epoch_order(&self, rng: &mut Xoshiro256PlusPlus, shuffle: bool) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.examples.len()).collect();
        if shuffle {
            order.shuffle(rng);
        }
        order
    }
}

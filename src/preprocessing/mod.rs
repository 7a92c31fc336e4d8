//! Data preprocessing module
//!
//! Plaintext column transforms applied before features are encrypted:
//! - Column concatenation, copying and type conversion
//! - Missing value indication and replacement
//! - Normalization (MinMax, MeanVariance)
//! - Categorical encoding (value-to-key, one-hot, one-hot-hash)
//! - Text featurization (hashed word and character n-grams)

mod columns;
mod encoder;
mod imputer;
mod scaler;
mod text;

pub use columns::{ColumnConcatenator, ColumnCopier, TypeConverter};
pub use encoder::{OneHotEncoder, OneHotHashEncoder, ValueToKeyMapper, Vocabulary, DEFAULT_HASH_BITS, MAX_HASH_BITS};
pub use imputer::{MissingValueIndicator, MissingValueReplacer, ReplacementMode};
pub use scaler::{Normalizer, NormalizerMode};
pub use text::TextFeaturizer;

use serde::{Deserialize, Serialize};

/// Input column and the output column it is written to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    pub input: String,
    pub output: String,
}

impl ColumnPair {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Pair up equally long input and output lists
    pub fn zip(inputs: &[String], outputs: &[String]) -> Vec<ColumnPair> {
        inputs
            .iter()
            .zip(outputs)
            .map(|(i, o)| ColumnPair::new(i.clone(), o.clone()))
            .collect()
    }
}

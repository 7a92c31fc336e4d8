//! Bag-of-n-grams text featurization

use crate::dataset::{Column, Frame};
use crate::error::{KolosalError, Result};
use crate::preprocessing::encoder::{hash_term, MAX_HASH_BITS};
use crate::preprocessing::ColumnPair;
use serde::{Deserialize, Serialize};

const WORD_SEED: u64 = 1;
const CHAR_SEED: u64 = 2;
const TEXT_START: char = '\u{2}';
const TEXT_END: char = '\u{3}';

/// Hashed word and character n-gram counts, L2-normalized per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFeaturizer {
    pub column: ColumnPair,
    /// Word n-grams of length 1..=word_ngram_length
    pub word_ngram_length: usize,
    /// Character n-grams of exactly this length
    pub char_ngram_length: usize,
    pub number_of_bits: u32,
}

impl TextFeaturizer {
    pub fn new(column: ColumnPair) -> Self {
        Self {
            column,
            word_ngram_length: 2,
            char_ngram_length: 3,
            number_of_bits: 10,
        }
    }

    pub fn with_number_of_bits(mut self, bits: u32) -> Result<Self> {
        if !(1..=MAX_HASH_BITS).contains(&bits) {
            return Err(KolosalError::invalid_parameter(
                "NumberOfBits",
                bits,
                format!("must be between 1 and {}", MAX_HASH_BITS),
            ));
        }
        self.number_of_bits = bits;
        Ok(self)
    }

    pub fn width(&self) -> usize {
        1usize << self.number_of_bits
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn featurize(&self, text: &str) -> Vec<f64> {
        let width = self.width();
        let mask = (width - 1) as u64;
        let mut row = vec![0.0; width];

        let tokens = Self::tokens(text);
        for n in 1..=self.word_ngram_length {
            for gram in tokens.windows(n) {
                row[(hash_term(WORD_SEED, &gram.join(" ")) & mask) as usize] += 1.0;
            }
        }

        let normalized: String = std::iter::once(TEXT_START)
            .chain(tokens.join(" ").chars())
            .chain(std::iter::once(TEXT_END))
            .collect();
        let chars: Vec<char> = normalized.chars().collect();
        if self.char_ngram_length > 0 {
            for gram in chars.windows(self.char_ngram_length) {
                let gram: String = gram.iter().collect();
                row[(hash_term(CHAR_SEED, &gram) & mask) as usize] += 1.0;
            }
        }

        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|v| *v /= norm);
        }
        row
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let values = match frame.column(&self.column.input)? {
            Column::Text { values } => values,
            other => {
                return Err(KolosalError::DataError(format!(
                    "text featurization needs a text column, '{}' is {}",
                    self.column.input,
                    other.kind()
                )))
            }
        };
        let rows = values
            .iter()
            .map(|v| self.featurize(v.as_deref().unwrap_or("")))
            .collect();
        let mut out = frame.clone();
        out.add_column(
            self.column.output.clone(),
            Column::Vector {
                width: self.width(),
                rows,
            },
        )?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn featurizer() -> TextFeaturizer {
        TextFeaturizer::new(ColumnPair::new("text", "features"))
    }

    #[test]
    fn test_rows_are_unit_length() {
        let frame = Frame::new()
            .with_column("text", Column::text(vec![Some("Encrypted training works"), None]))
            .unwrap();
        let out = featurizer().transform(&frame).unwrap();
        let rows = out.column("features").unwrap().numeric_rows().unwrap();
        let norm: f64 = rows[0].iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
        assert_eq!(rows[0].len(), 1024);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let f = featurizer();
        assert_eq!(f.featurize("Hello, World!"), f.featurize("hello world"));
    }

    #[test]
    fn test_rejects_numeric_column() {
        let frame = Frame::new().with_column("text", Column::scalar(vec![1.0])).unwrap();
        assert!(featurizer().transform(&frame).is_err());
    }
}

//! Categorical encoders: value-to-key, one-hot and one-hot-hash

use crate::dataset::{Column, Frame};
use crate::error::{KolosalError, Result};
use crate::preprocessing::ColumnPair;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default hash width for [`OneHotHashEncoder`]
pub const DEFAULT_HASH_BITS: u32 = 16;
/// Largest accepted hash width
pub const MAX_HASH_BITS: u32 = 30;

/// FNV-1a over `seed` and the UTF-8 bytes of `term`
pub(crate) fn hash_term(seed: u64, term: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    seed.to_le_bytes()
        .iter()
        .chain(term.as_bytes())
        .fold(OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Categorical view of a column: one optional term per row
pub(crate) fn column_terms(column: &Column) -> Result<Vec<Option<String>>> {
    Ok(match column {
        Column::Text { values } => values.clone(),
        Column::Scalar { values } => values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(v.to_string()) })
            .collect(),
        Column::Key { values, .. } => values
            .iter()
            .map(|&k| if k == 0 { None } else { Some(k.to_string()) })
            .collect(),
        Column::Vector { .. } => {
            return Err(KolosalError::DataError(
                "vector columns cannot be treated as categorical".to_string(),
            ))
        }
    })
}

/// Term dictionary in order of first occurrence; keys are 1-based
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, u32>,
}

impl PartialEq for Vocabulary {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
    }
}

impl Vocabulary {
    pub fn build<'a>(terms: impl Iterator<Item = &'a Option<String>>) -> Self {
        let mut vocab = Self::default();
        for term in terms.flatten() {
            if !vocab.index.contains_key(term) {
                vocab.terms.push(term.clone());
                vocab.index.insert(term.clone(), vocab.terms.len() as u32);
            }
        }
        vocab
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Key of `term`; 0 when unseen. Falls back to a scan after deserialization.
    pub fn key(&self, term: &str) -> u32 {
        if let Some(&k) = self.index.get(term) {
            return k;
        }
        self.terms
            .iter()
            .position(|t| t == term)
            .map(|p| p as u32 + 1)
            .unwrap_or(0)
    }
}

/// Maps categorical values to 1-based keys; unseen and missing map to 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueToKeyMapper {
    pub column: ColumnPair,
    vocabulary: Option<Vocabulary>,
}

impl ValueToKeyMapper {
    pub fn new(column: ColumnPair) -> Self {
        Self {
            column,
            vocabulary: None,
        }
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.vocabulary.as_ref()
    }

    pub fn fit(&mut self, frame: &Frame) -> Result<&mut Self> {
        let terms = column_terms(frame.column(&self.column.input)?)?;
        self.vocabulary = Some(Vocabulary::build(terms.iter()));
        Ok(self)
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let vocab = self.vocabulary.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        let terms = column_terms(frame.column(&self.column.input)?)?;
        let keys = terms
            .iter()
            .map(|t| t.as_deref().map(|t| vocab.key(t)).unwrap_or(0))
            .collect();
        let mut out = frame.clone();
        out.add_column(self.column.output.clone(), Column::key(keys, vocab.len() as u32))?;
        Ok(out)
    }
}

/// Indicator vector over the fitted vocabulary of each column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub columns: Vec<ColumnPair>,
    vocabularies: HashMap<String, Vocabulary>,
    is_fitted: bool,
}

impl OneHotEncoder {
    pub fn new(columns: Vec<ColumnPair>) -> Self {
        Self {
            columns,
            vocabularies: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, frame: &Frame) -> Result<&mut Self> {
        self.vocabularies.clear();
        for pair in &self.columns {
            let terms = column_terms(frame.column(&pair.input)?)?;
            self.vocabularies.insert(pair.input.clone(), Vocabulary::build(terms.iter()));
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
            let vocab = self
                .vocabularies
                .get(&pair.input)
                .ok_or_else(|| KolosalError::FeatureNotFound(pair.input.clone()))?;
            let terms = column_terms(frame.column(&pair.input)?)?;
            let rows = terms
                .iter()
                .map(|t| {
                    let mut row = vec![0.0; vocab.len()];
                    if let Some(k) = t.as_deref().map(|t| vocab.key(t)).filter(|&k| k > 0) {
                        row[k as usize - 1] = 1.0;
                    }
                    row
                })
                .collect();
            out.add_column(pair.output.clone(), Column::Vector { width: vocab.len(), rows })?;
        }
        Ok(out)
    }
}

/// Indicator vector of width `2^number_of_bits` indexed by term hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotHashEncoder {
    pub columns: Vec<ColumnPair>,
    pub number_of_bits: u32,
}

impl OneHotHashEncoder {
    pub fn new(columns: Vec<ColumnPair>, number_of_bits: u32) -> Result<Self> {
        if !(1..=MAX_HASH_BITS).contains(&number_of_bits) {
            return Err(KolosalError::invalid_parameter(
                "NumberOfBits",
                number_of_bits,
                format!("must be between 1 and {}", MAX_HASH_BITS),
            ));
        }
        Ok(Self { columns, number_of_bits })
    }

    pub fn width(&self) -> usize {
        1usize << self.number_of_bits
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let width = self.width();
        let mask = (width - 1) as u64;
        let mut out = frame.clone();
        for pair in &self.columns {
            let terms = column_terms(frame.column(&pair.input)?)?;
            let rows = terms
                .iter()
                .map(|t| {
                    let mut row = vec![0.0; width];
                    if let Some(t) = t {
                        row[(hash_term(0, t) & mask) as usize] = 1.0;
                    }
                    row
                })
                .collect();
            out.add_column(pair.output.clone(), Column::Vector { width, rows })?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new()
            .with_column("color", Column::text(vec![Some("red"), Some("blue"), None, Some("red")]))
            .unwrap()
    }

    #[test]
    fn test_value_to_key() {
        let mut mapper = ValueToKeyMapper::new(ColumnPair::new("color", "color_key"));
        let out = mapper.fit(&frame()).unwrap().transform(&frame()).unwrap();
        assert_eq!(out.column("color_key").unwrap(), &Column::key(vec![1, 2, 0, 1], 2));
    }

    #[test]
    fn test_one_hot() {
        let mut enc = OneHotEncoder::new(vec![ColumnPair::new("color", "color_oh")]);
        let out = enc.fit(&frame()).unwrap().transform(&frame()).unwrap();
        let rows = out.column("color_oh").unwrap().numeric_rows().unwrap();
        assert_eq!(rows[0], vec![1.0, 0.0]);
        assert_eq!(rows[1], vec![0.0, 1.0]);
        assert_eq!(rows[2], vec![0.0, 0.0]);
    }

    #[test]
    fn test_one_hot_unseen_is_zero() {
        let mut enc = OneHotEncoder::new(vec![ColumnPair::new("color", "oh")]);
        enc.fit(&frame()).unwrap();
        let other = Frame::new().with_column("color", Column::text(vec![Some("green")])).unwrap();
        let rows = enc.transform(&other).unwrap().column("oh").unwrap().numeric_rows().unwrap();
        assert_eq!(rows[0], vec![0.0, 0.0]);
    }

    #[test]
    fn test_one_hot_hash() {
        let enc = OneHotHashEncoder::new(vec![ColumnPair::new("color", "h")], 4).unwrap();
        let out = enc.transform(&frame()).unwrap();
        let rows = out.column("h").unwrap().numeric_rows().unwrap();
        assert_eq!(rows[0].len(), 16);
        assert_eq!(rows[0].iter().sum::<f64>(), 1.0);
        assert_eq!(rows[0], rows[3]);
        assert_eq!(rows[2].iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn test_hash_bits_validated() {
        assert!(OneHotHashEncoder::new(vec![], 0).is_err());
        assert!(OneHotHashEncoder::new(vec![], 31).is_err());
    }

    #[test]
    fn test_vocabulary_after_deserialize() {
        let terms = vec![Some("a".to_string()), Some("b".to_string())];
        let vocab = Vocabulary::build(terms.iter());
        let back: Vocabulary = serde_json::from_str(&serde_json::to_string(&vocab).unwrap()).unwrap();
        assert_eq!(back.key("b"), 2);
        assert_eq!(back.key("zz"), 0);
    }
}

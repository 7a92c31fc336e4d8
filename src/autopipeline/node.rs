//! Serializable description of one pipeline step

use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineNodeType {
    Transform,
    Trainer,
}

/// Transform estimators a pipeline node can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorName {
    ColumnConcatenating,
    ColumnCopying,
    MissingValueIndicating,
    MissingValueReplacing,
    Normalizing,
    OneHotEncoding,
    OneHotHashEncoding,
    TextFeaturizing,
    TypeConverting,
    ValueToKeyMapping,
}

impl EstimatorName {
    pub const ALL: [EstimatorName; 10] = [
        EstimatorName::ColumnConcatenating,
        EstimatorName::ColumnCopying,
        EstimatorName::MissingValueIndicating,
        EstimatorName::MissingValueReplacing,
        EstimatorName::Normalizing,
        EstimatorName::OneHotEncoding,
        EstimatorName::OneHotHashEncoding,
        EstimatorName::TextFeaturizing,
        EstimatorName::TypeConverting,
        EstimatorName::ValueToKeyMapping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorName::ColumnConcatenating => "ColumnConcatenating",
            EstimatorName::ColumnCopying => "ColumnCopying",
            EstimatorName::MissingValueIndicating => "MissingValueIndicating",
            EstimatorName::MissingValueReplacing => "MissingValueReplacing",
            EstimatorName::Normalizing => "Normalizing",
            EstimatorName::OneHotEncoding => "OneHotEncoding",
            EstimatorName::OneHotHashEncoding => "OneHotHashEncoding",
            EstimatorName::TextFeaturizing => "TextFeaturizing",
            EstimatorName::TypeConverting => "TypeConverting",
            EstimatorName::ValueToKeyMapping => "ValueToKeyMapping",
        }
    }

    /// Column arity the estimator accepts
    pub fn arity(&self) -> Arity {
        match self {
            EstimatorName::ColumnConcatenating => Arity::ManyToOne,
            EstimatorName::ColumnCopying
            | EstimatorName::Normalizing
            | EstimatorName::TextFeaturizing
            | EstimatorName::ValueToKeyMapping => Arity::OneToOne,
            EstimatorName::MissingValueIndicating
            | EstimatorName::MissingValueReplacing
            | EstimatorName::OneHotEncoding
            | EstimatorName::OneHotHashEncoding
            | EstimatorName::TypeConverting => Arity::ManyToMany,
        }
    }
}

impl fmt::Display for EstimatorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimatorName {
    type Err = KolosalError;

    fn from_str(s: &str) -> Result<Self> {
        EstimatorName::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| KolosalError::InvalidInput(format!("unknown estimator '{}'", s)))
    }
}

/// Input/output column arity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one input and one output
    OneToOne,
    /// One or more inputs, one output
    ManyToOne,
    /// One or more inputs with as many outputs
    ManyToMany,
}

impl Arity {
    pub fn accepts(&self, inputs: usize, outputs: usize) -> bool {
        match self {
            Arity::OneToOne => inputs == 1 && outputs == 1,
            Arity::ManyToOne => inputs >= 1 && outputs == 1,
            Arity::ManyToMany => inputs >= 1 && inputs == outputs,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Arity::OneToOne => "1 input / 1 output",
            Arity::ManyToOne => "N inputs / 1 output",
            Arity::ManyToMany => "N inputs / N outputs",
        })
    }
}

/// One step of a pipeline: estimator name, columns and hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
    pub name: String,
    pub node_type: PipelineNodeType,
    pub in_columns: Vec<String>,
    pub out_columns: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl PipelineNode {
    pub fn new(
        name: impl Into<String>,
        node_type: PipelineNodeType,
        in_columns: Vec<String>,
        out_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            node_type,
            in_columns,
            out_columns,
            properties: BTreeMap::new(),
        }
    }

    /// Transform node for a known estimator
    pub fn transform(estimator: EstimatorName, in_columns: Vec<String>, out_columns: Vec<String>) -> Self {
        Self::new(estimator.to_string(), PipelineNodeType::Transform, in_columns, out_columns)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property_str(&self, key: &str) -> Result<Option<&str>> {
        match self.properties.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(KolosalError::invalid_parameter(key, other, "expected a string")),
        }
    }

    pub fn property_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.properties.get(key) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| KolosalError::invalid_parameter(key, value, "expected a non-negative integer")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for name in EstimatorName::ALL {
            assert_eq!(name.to_string().parse::<EstimatorName>().unwrap(), name);
        }
        assert!("Bogus".parse::<EstimatorName>().is_err());
    }

    #[test]
    fn test_arity() {
        assert!(Arity::OneToOne.accepts(1, 1));
        assert!(!Arity::OneToOne.accepts(2, 2));
        assert!(Arity::ManyToOne.accepts(3, 1));
        assert!(!Arity::ManyToOne.accepts(0, 1));
        assert!(Arity::ManyToMany.accepts(2, 2));
        assert!(!Arity::ManyToMany.accepts(2, 1));
    }

    #[test]
    fn test_properties() {
        let node = PipelineNode::transform(EstimatorName::OneHotHashEncoding, vec!["a".into()], vec!["b".into()])
            .with_property("NumberOfBits", 8)
            .with_property("Mode", "MinMax");
        assert_eq!(node.property_u32("NumberOfBits").unwrap(), Some(8));
        assert_eq!(node.property_str("Mode").unwrap(), Some("MinMax"));
        assert!(node.property_u32("Mode").is_err());
        assert_eq!(node.property_str("Missing").unwrap(), None);
    }

    #[test]
    fn test_node_json() {
        let node = PipelineNode::transform(EstimatorName::ColumnCopying, vec!["a".into()], vec!["b".into()]);
        let json = serde_json::to_string(&node).unwrap();
        let back: PipelineNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}

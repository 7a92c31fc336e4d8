//! Pipeline node to transform estimator adapters

use crate::autopipeline::node::{EstimatorName, PipelineNode, PipelineNodeType};
use crate::dataset::Frame;
use crate::error::{KolosalError, Result};
use crate::preprocessing::{
    ColumnConcatenator, ColumnCopier, ColumnPair, MissingValueIndicator, MissingValueReplacer, Normalizer,
    NormalizerMode, OneHotEncoder, OneHotHashEncoder, ReplacementMode, TextFeaturizer, TypeConverter,
    ValueToKeyMapper, DEFAULT_HASH_BITS,
};
use serde::{Deserialize, Serialize};

/// Property keys read from [`PipelineNode::properties`]
pub const PROPERTY_MODE: &str = "Mode";
pub const PROPERTY_REPLACEMENT_MODE: &str = "ReplacementMode";
pub const PROPERTY_NUMBER_OF_BITS: &str = "NumberOfBits";

/// A validated transform estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformEstimator {
    ColumnConcatenating(ColumnConcatenator),
    ColumnCopying(ColumnCopier),
    MissingValueIndicating(MissingValueIndicator),
    MissingValueReplacing(MissingValueReplacer),
    Normalizing(Normalizer),
    OneHotEncoding(OneHotEncoder),
    OneHotHashEncoding(OneHotHashEncoder),
    TextFeaturizing(TextFeaturizer),
    TypeConverting(TypeConverter),
    ValueToKeyMapping(ValueToKeyMapper),
}

impl TransformEstimator {
    pub fn name(&self) -> EstimatorName {
        match self {
            TransformEstimator::ColumnConcatenating(_) => EstimatorName::ColumnConcatenating,
            TransformEstimator::ColumnCopying(_) => EstimatorName::ColumnCopying,
            TransformEstimator::MissingValueIndicating(_) => EstimatorName::MissingValueIndicating,
            TransformEstimator::MissingValueReplacing(_) => EstimatorName::MissingValueReplacing,
            TransformEstimator::Normalizing(_) => EstimatorName::Normalizing,
            TransformEstimator::OneHotEncoding(_) => EstimatorName::OneHotEncoding,
            TransformEstimator::OneHotHashEncoding(_) => EstimatorName::OneHotHashEncoding,
            TransformEstimator::TextFeaturizing(_) => EstimatorName::TextFeaturizing,
            TransformEstimator::TypeConverting(_) => EstimatorName::TypeConverting,
            TransformEstimator::ValueToKeyMapping(_) => EstimatorName::ValueToKeyMapping,
        }
    }

    /// Learn whatever state the transform needs; stateless transforms do nothing
    pub fn fit(&mut self, frame: &Frame) -> Result<()> {
        match self {
            TransformEstimator::MissingValueReplacing(t) => {
                t.fit(frame)?;
            }
            TransformEstimator::Normalizing(t) => {
                t.fit(frame)?;
            }
            TransformEstimator::OneHotEncoding(t) => {
                t.fit(frame)?;
            }
            TransformEstimator::ValueToKeyMapping(t) => {
                t.fit(frame)?;
            }
            TransformEstimator::ColumnConcatenating(_)
            | TransformEstimator::ColumnCopying(_)
            | TransformEstimator::MissingValueIndicating(_)
            | TransformEstimator::OneHotHashEncoding(_)
            | TransformEstimator::TextFeaturizing(_)
            | TransformEstimator::TypeConverting(_) => {}
        }
        Ok(())
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        match self {
            TransformEstimator::ColumnConcatenating(t) => t.transform(frame),
            TransformEstimator::ColumnCopying(t) => t.transform(frame),
            TransformEstimator::MissingValueIndicating(t) => t.transform(frame),
            TransformEstimator::MissingValueReplacing(t) => t.transform(frame),
            TransformEstimator::Normalizing(t) => t.transform(frame),
            TransformEstimator::OneHotEncoding(t) => t.transform(frame),
            TransformEstimator::OneHotHashEncoding(t) => t.transform(frame),
            TransformEstimator::TextFeaturizing(t) => t.transform(frame),
            TransformEstimator::TypeConverting(t) => t.transform(frame),
            TransformEstimator::ValueToKeyMapping(t) => t.transform(frame),
        }
    }

    pub fn fit_transform(&mut self, frame: &Frame) -> Result<Frame> {
        self.fit(frame)?;
        self.transform(frame)
    }
}

fn check_arity(estimator: EstimatorName, node: &PipelineNode) -> Result<()> {
    let arity = estimator.arity();
    let (inputs, outputs) = (node.in_columns.len(), node.out_columns.len());
    if !arity.accepts(inputs, outputs) {
        return Err(KolosalError::ArityMismatch {
            estimator: estimator.to_string(),
            expected: arity.to_string(),
            inputs,
            outputs,
        });
    }
    Ok(())
}

/// Build the estimator a transform node describes.
///
/// The node's arity is checked against the estimator kind before any
/// hyperparameter is read.
pub fn create_estimator(node: &PipelineNode) -> Result<TransformEstimator> {
    if node.node_type != PipelineNodeType::Transform {
        return Err(KolosalError::InvalidInput(format!(
            "node '{}' is not a transform node",
            node.name
        )));
    }
    let name: EstimatorName = node.name.parse()?;
    check_arity(name, node)?;

    let first_in = || node.in_columns[0].clone();
    let first_out = || node.out_columns[0].clone();
    let pairs = || ColumnPair::zip(&node.in_columns, &node.out_columns);

    Ok(match name {
        EstimatorName::ColumnConcatenating => {
            TransformEstimator::ColumnConcatenating(ColumnConcatenator::new(node.in_columns.clone(), first_out()))
        }
        EstimatorName::ColumnCopying => {
            TransformEstimator::ColumnCopying(ColumnCopier::new(first_in(), first_out()))
        }
        EstimatorName::MissingValueIndicating => {
            TransformEstimator::MissingValueIndicating(MissingValueIndicator::new(pairs()))
        }
        EstimatorName::MissingValueReplacing => {
            let mode = match node.property_str(PROPERTY_REPLACEMENT_MODE)? {
                Some(s) => s.parse()?,
                None => ReplacementMode::default(),
            };
            TransformEstimator::MissingValueReplacing(MissingValueReplacer::new(pairs(), mode))
        }
        EstimatorName::Normalizing => {
            let mode = match node.property_str(PROPERTY_MODE)? {
                Some(s) => s.parse()?,
                None => NormalizerMode::default(),
            };
            TransformEstimator::Normalizing(Normalizer::new(ColumnPair::new(first_in(), first_out()), mode))
        }
        EstimatorName::OneHotEncoding => TransformEstimator::OneHotEncoding(OneHotEncoder::new(pairs())),
        EstimatorName::OneHotHashEncoding => {
            let bits = node.property_u32(PROPERTY_NUMBER_OF_BITS)?.unwrap_or(DEFAULT_HASH_BITS);
            TransformEstimator::OneHotHashEncoding(OneHotHashEncoder::new(pairs(), bits)?)
        }
        EstimatorName::TextFeaturizing => {
            let featurizer = TextFeaturizer::new(ColumnPair::new(first_in(), first_out()));
            let featurizer = match node.property_u32(PROPERTY_NUMBER_OF_BITS)? {
                Some(bits) => featurizer.with_number_of_bits(bits)?,
                None => featurizer,
            };
            TransformEstimator::TextFeaturizing(featurizer)
        }
        EstimatorName::TypeConverting => TransformEstimator::TypeConverting(TypeConverter::new(pairs())),
        EstimatorName::ValueToKeyMapping => {
            TransformEstimator::ValueToKeyMapping(ValueToKeyMapper::new(ColumnPair::new(first_in(), first_out())))
        }
    })
}

/// A pipeline node together with the estimator built from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedTransform {
    pub node: PipelineNode,
    pub estimator: TransformEstimator,
}

fn strings(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

impl SuggestedTransform {
    pub fn from_node(node: PipelineNode) -> Result<Self> {
        let estimator = create_estimator(&node)?;
        Ok(Self { node, estimator })
    }

    fn build(name: EstimatorName, inputs: &[&str], outputs: &[&str]) -> Result<Self> {
        Self::from_node(PipelineNode::transform(name, strings(inputs), strings(outputs)))
    }

    pub fn column_concatenating(inputs: &[&str], output: &str) -> Result<Self> {
        Self::build(EstimatorName::ColumnConcatenating, inputs, &[output])
    }

    pub fn column_copying(input: &str, output: &str) -> Result<Self> {
        Self::build(EstimatorName::ColumnCopying, &[input], &[output])
    }

    pub fn missing_value_indicating(inputs: &[&str], outputs: &[&str]) -> Result<Self> {
        Self::build(EstimatorName::MissingValueIndicating, inputs, outputs)
    }

    pub fn missing_value_replacing(inputs: &[&str], outputs: &[&str]) -> Result<Self> {
        Self::build(EstimatorName::MissingValueReplacing, inputs, outputs)
    }

    pub fn normalizing(input: &str, output: &str) -> Result<Self> {
        Self::build(EstimatorName::Normalizing, &[input], &[output])
    }

    pub fn one_hot_encoding(inputs: &[&str], outputs: &[&str]) -> Result<Self> {
        Self::build(EstimatorName::OneHotEncoding, inputs, outputs)
    }

    pub fn one_hot_hash_encoding(inputs: &[&str], outputs: &[&str]) -> Result<Self> {
        Self::build(EstimatorName::OneHotHashEncoding, inputs, outputs)
    }

    pub fn text_featurizing(input: &str, output: &str) -> Result<Self> {
        Self::build(EstimatorName::TextFeaturizing, &[input], &[output])
    }

    pub fn type_converting(inputs: &[&str], outputs: &[&str]) -> Result<Self> {
        Self::build(EstimatorName::TypeConverting, inputs, outputs)
    }

    pub fn value_to_key_mapping(input: &str, output: &str) -> Result<Self> {
        Self::build(EstimatorName::ValueToKeyMapping, &[input], &[output])
    }
}

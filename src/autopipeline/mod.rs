//! Pipeline adapters
//!
//! Turns serializable pipeline node descriptions into validated transform
//! estimators and runs them in sequence:
//! - [`PipelineNode`] - name, type, columns and hyperparameter bag
//! - [`create_estimator`] - arity-checked factory
//! - [`TransformPipeline`] - fit and apply a sequence of transforms

mod estimator;
mod node;
mod pipeline;

pub use estimator::{
    create_estimator, SuggestedTransform, TransformEstimator, PROPERTY_MODE, PROPERTY_NUMBER_OF_BITS,
    PROPERTY_REPLACEMENT_MODE,
};
pub use node::{Arity, EstimatorName, PipelineNode, PipelineNodeType};
pub use pipeline::TransformPipeline;

//! Ordered sequence of suggested transforms

use crate::autopipeline::estimator::SuggestedTransform;
use crate::autopipeline::node::PipelineNode;
use crate::dataset::Frame;
use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformPipeline {
    transforms: Vec<SuggestedTransform>,
    is_fitted: bool,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from node descriptions, validating each one
    pub fn from_nodes(nodes: Vec<PipelineNode>) -> Result<Self> {
        let transforms = nodes
            .into_iter()
            .map(SuggestedTransform::from_node)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            transforms,
            is_fitted: false,
        })
    }

    pub fn with_transform(mut self, transform: SuggestedTransform) -> Self {
        self.push(transform);
        self
    }

    pub fn push(&mut self, transform: SuggestedTransform) {
        self.transforms.push(transform);
        self.is_fitted = false;
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PipelineNode> {
        self.transforms.iter().map(|t| &t.node)
    }

    /// Fit each transform on the output of the previous one
    pub fn fit_transform(&mut self, frame: &Frame) -> Result<Frame> {
        let mut current = frame.clone();
        for transform in &mut self.transforms {
            current = transform.estimator.fit_transform(&current)?;
            debug!(estimator = %transform.node.name, columns = current.column_count(), "Fitted transform");
        }
        self.is_fitted = true;
        Ok(current)
    }

    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }
        self.transforms
            .iter()
            .try_fold(frame.clone(), |current, t| t.estimator.transform(&current))
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
    use crate::dataset::Column;

    #[test]
    fn test_requires_fit() {
        let pipeline = TransformPipeline::new()
            .with_transform(SuggestedTransform::normalizing("a", "a").unwrap());
        let frame = Frame::new().with_column("a", Column::scalar(vec![1.0])).unwrap();
        assert!(matches!(pipeline.transform(&frame), Err(KolosalError::ModelNotFitted)));
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let mut pipeline = TransformPipeline::new();
        let frame = Frame::new().with_column("a", Column::scalar(vec![1.0])).unwrap();
        assert_eq!(pipeline.fit_transform(&frame).unwrap(), frame);
    }
}

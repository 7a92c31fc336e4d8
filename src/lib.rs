//! Kolosal Encrypted - Encrypted logistic regression for Kolosal AutoML
//!
//! This crate trains binary logistic regression models with stochastic dual
//! coordinate ascent (SDCA) over homomorphically encrypted feature vectors:
//! - CKKS-style encryption context, key files and ciphertext arithmetic
//! - Encrypted SDCA trainer with noise budget tracking
//! - One-shot materialization into a plaintext linear model
//! - Plaintext preprocessing transforms and a node-driven pipeline factory
//!
//! # Modules
//!
//! ## Encryption
//! - [`encryption`] - Parameters, keys, the [`encryption::CiphertextProvider`] seam
//! - [`dataset`] - Plaintext frames, encrypted columns, the feature store
//!
//! ## Training
//! - [`training`] - Encrypted SDCA, options, materialization
//! - [`catalog`] - Column-bound entry points for encryption and training
//!
//! ## Preprocessing
//! - [`preprocessing`] - Normalization, encoding, imputation, text
//! - [`autopipeline`] - Pipeline nodes and the estimator factory
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Encryption
pub mod encryption;
pub mod dataset;

// Training
pub mod training;
pub mod catalog;

// Preprocessing
pub mod preprocessing;
pub mod autopipeline;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{KolosalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{KolosalError, Result};

    // Encryption
    pub use crate::encryption::{
        CiphertextBundle, CiphertextProvider, EncryptionContext, EncryptionParameters, FromKeyFile,
        KeyGenerator, KeySet, SealEstimator, SealTransformer, SimulatedCiphertext, SimulatedCkksProvider,
    };

    // Data
    pub use crate::dataset::{Column, EncryptedFeatureStore, EncryptedFrame, Frame};

    // Training
    pub use crate::training::{
        EncryptedLinearModel, EncryptedSdcaOptions, EncryptedSdcaTrainer, LinearBinaryModel,
        ModelMaterializer, NoisePolicy, TrainingReport,
    };
    pub use crate::catalog::{BinaryClassificationCatalog, EncryptedSdcaLogisticRegressionTrainer, TransformsCatalog};

    // Preprocessing
    pub use crate::preprocessing::{Normalizer, NormalizerMode, OneHotEncoder, TextFeaturizer};

    // Auto pipeline
    pub use crate::autopipeline::{create_estimator, EstimatorName, PipelineNode, SuggestedTransform, TransformPipeline};

    // Utilities
    pub use crate::utils::{CancellationToken, ParallelConfig};
}

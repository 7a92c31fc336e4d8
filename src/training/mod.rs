//! Encrypted model training
//!
//! - [`EncryptedSdcaTrainer`] - SDCA logistic regression over encrypted features
//! - [`ModelMaterializer`] - one-shot decryption into a [`LinearBinaryModel`]

mod config;
mod materializer;
mod model;
mod sdca;

pub use config::{
    EncryptedSdcaOptions, NoisePolicy, DEFAULT_ENCRYPTED_FEATURE_COLUMN, DEFAULT_FEATURE_COLUMN,
    DEFAULT_LABEL_COLUMN, DEFAULT_MAX_ITERATIONS,
};
pub use materializer::{ModelMaterializer, TRAINER_NAME};
pub use model::{LinearBinaryModel, ModelMetadata};
pub use sdca::{EncryptedLinearModel, EncryptedSdcaTrainer, TrainingReport};

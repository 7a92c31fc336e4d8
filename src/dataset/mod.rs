//! Plaintext frames, encrypted columns and the encrypted feature store

mod encrypted;
mod frame;

pub use encrypted::{EncryptedColumn, EncryptedFeatureStore, EncryptedFrame, TrainingExample};
pub use frame::{Column, Frame};

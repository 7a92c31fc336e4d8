//! Decrypts an encrypted model into a plaintext [`LinearBinaryModel`]

use crate::encryption::{decrypt_vector, CiphertextProvider};
use crate::error::{KolosalError, Result};
use crate::training::model::{LinearBinaryModel, ModelMetadata};
use crate::training::sdca::EncryptedLinearModel;
use chrono::Utc;
use ndarray::Array1;
use tracing::info;

pub const TRAINER_NAME: &str = "EncryptedSdcaLogisticRegression";

fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// One-shot decryption of trained weights. Requires the secret key.
pub struct ModelMaterializer;

impl ModelMaterializer {
    pub fn materialize<P: CiphertextProvider>(
        model: &EncryptedLinearModel<P::Ciphertext>,
        provider: &P,
    ) -> Result<LinearBinaryModel> {
        if !provider.can_decrypt() {
            return Err(KolosalError::KeyUnavailable(
                "materializing a model requires the secret key".to_string(),
            ));
        }

        let mut weights = decrypt_vector(provider, model.weights())?;
        weights.truncate(model.dimension());

        let threshold = model.l1_threshold();
        if threshold > 0.0 {
            weights.iter_mut().for_each(|w| *w = soft_threshold(*w, threshold));
        }

        let report = model.report();
        let metadata = ModelMetadata {
            trainer: TRAINER_NAME.to_string(),
            trained_at: Utc::now(),
            n_features: model.dimension(),
            l2_regularization: model.l2_regularization(),
            l1_regularization: model.l1_regularization(),
            epochs: report.epochs,
            converged: report.converged,
        };

        info!(features = model.dimension(), l1_threshold = threshold, "Materialized plaintext model");

        Ok(LinearBinaryModel::new(Array1::from(weights), model.bias()).with_metadata(metadata))
    }
}

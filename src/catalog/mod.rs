//! Entry points for encryption-aware pipelines
//!
//! [`TransformsCatalog::encrypt_features`] builds the column estimator that
//! encrypts features; [`BinaryClassificationCatalog`] builds the encrypted
//! SDCA logistic regression trainer that consumes them.

use crate::dataset::{EncryptedFeatureStore, EncryptedFrame};
use crate::encryption::{CiphertextProvider, EncryptionContext, EncryptionParameters, FromKeyFile, SealEstimator};
use crate::error::{KolosalError, Result};
use crate::training::{
    EncryptedLinearModel, EncryptedSdcaOptions, EncryptedSdcaTrainer, LinearBinaryModel, ModelMaterializer,
};
use crate::utils::CancellationToken;
use std::path::PathBuf;
use std::sync::Arc;

/// Column transforms
pub struct TransformsCatalog;

impl TransformsCatalog {
    /// Encrypt (or, with `encrypt = false`, decrypt) `input_column` into
    /// `output_column`. The input defaults to the output column name.
    #[allow(clippy::too_many_arguments)]
    pub fn encrypt_features(
        encrypt: bool,
        scale: f64,
        poly_modulus_degree: u64,
        key_file: impl Into<PathBuf>,
        bit_sizes: Vec<u32>,
        output_column: &str,
        input_column: Option<&str>,
    ) -> SealEstimator {
        let parameters =
            EncryptionParameters::new(poly_modulus_degree, bit_sizes, scale).with_key_file(key_file);
        SealEstimator::new(encrypt, parameters, output_column, input_column.map(str::to_string))
    }
}

/// Binary classification trainers
pub struct BinaryClassificationCatalog;

impl BinaryClassificationCatalog {
    /// Encrypted SDCA logistic regression from individual arguments.
    /// `None` regularization and iteration values use the trainer defaults.
    #[allow(clippy::too_many_arguments)]
    pub fn encrypted_sdca_logistic_regression(
        poly_modulus_degree: u64,
        coeff_moduli: Vec<u32>,
        scale: f64,
        encrypted_feature_column: &str,
        galois_key_file: impl Into<PathBuf>,
        label_column: &str,
        feature_column: &str,
        example_weight_column: Option<&str>,
        l2_regularization: Option<f64>,
        l1_regularization: Option<f64>,
        maximum_number_of_iterations: Option<usize>,
    ) -> EncryptedSdcaLogisticRegressionTrainer {
        let parameters =
            EncryptionParameters::new(poly_modulus_degree, coeff_moduli, scale).with_key_file(galois_key_file);
        let options = EncryptedSdcaOptions {
            label_column: label_column.to_string(),
            feature_column: feature_column.to_string(),
            encrypted_feature_column: encrypted_feature_column.to_string(),
            example_weight_column: example_weight_column.map(str::to_string),
            l2_regularization,
            l1_regularization,
            maximum_number_of_iterations,
            ..EncryptedSdcaOptions::default()
        };
        EncryptedSdcaLogisticRegressionTrainer::new(parameters, options)
    }

    pub fn encrypted_sdca_logistic_regression_with_options(
        parameters: EncryptionParameters,
        options: EncryptedSdcaOptions,
    ) -> EncryptedSdcaLogisticRegressionTrainer {
        EncryptedSdcaLogisticRegressionTrainer::new(parameters, options)
    }
}

/// Column-bound encrypted SDCA logistic regression trainer
#[derive(Debug, Clone)]
pub struct EncryptedSdcaLogisticRegressionTrainer {
    parameters: EncryptionParameters,
    options: EncryptedSdcaOptions,
    cancellation: Option<CancellationToken>,
}

impl EncryptedSdcaLogisticRegressionTrainer {
    pub fn new(parameters: EncryptionParameters, options: EncryptedSdcaOptions) -> Self {
        Self {
            parameters,
            options,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn parameters(&self) -> &EncryptionParameters {
        &self.parameters
    }

    pub fn options(&self) -> &EncryptedSdcaOptions {
        &self.options
    }

    pub fn context(&self) -> Result<Arc<EncryptionContext>> {
        EncryptionContext::new(self.parameters.clone())
    }

    fn core_trainer(&self) -> EncryptedSdcaTrainer {
        let trainer = EncryptedSdcaTrainer::new(self.options.clone());
        match &self.cancellation {
            Some(token) => trainer.with_cancellation(token.clone()),
            None => trainer,
        }
    }

    /// Train on the encrypted feature, label and weight columns of `frame`
    pub fn fit<P: CiphertextProvider>(
        &self,
        frame: &EncryptedFrame<P::Ciphertext>,
        provider: &P,
    ) -> Result<EncryptedLinearModel<P::Ciphertext>> {
        self.options.validate()?;
        provider.context().check_parameters(&self.parameters)?;
        let store = EncryptedFeatureStore::from_columns(
            frame,
            &self.options.encrypted_feature_column,
            &self.options.label_column,
            self.options.example_weight_column.as_deref(),
        )?;
        self.core_trainer().train(&store, provider)
    }

    /// Load the provider from the configured key file, then train
    pub fn fit_from_key_file<P>(&self, frame: &EncryptedFrame<P::Ciphertext>) -> Result<EncryptedLinearModel<P::Ciphertext>>
    where
        P: CiphertextProvider + FromKeyFile,
    {
        let provider = P::from_key_file(self.context()?)?;
        self.fit(frame, &provider)
    }

    /// Train, then decrypt the weights. Requires the secret key.
    pub fn fit_and_materialize<P: CiphertextProvider>(
        &self,
        frame: &EncryptedFrame<P::Ciphertext>,
        provider: &P,
    ) -> Result<LinearBinaryModel> {
        if !provider.can_decrypt() {
            return Err(KolosalError::KeyUnavailable(
                "materializing a model requires the secret key".to_string(),
            ));
        }
        let model = self.fit(frame, provider)?;
        ModelMaterializer::materialize(&model, provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_features_defaults_input() {
        let est = TransformsCatalog::encrypt_features(true, 2f64.powi(40), 8192, "keys.json", vec![60, 40, 40, 60], "Features", None);
        assert_eq!(est.input_column, "Features");
        assert_eq!(est.parameters.key_file, Some(PathBuf::from("keys.json")));
    }

    #[test]
    fn test_trainer_columns() {
        let trainer = BinaryClassificationCatalog::encrypted_sdca_logistic_regression(
            8192,
            vec![60, 40, 40, 60],
            2f64.powi(40),
            "Enc",
            "keys.json",
            "Label",
            "Features",
            Some("Weight"),
            Some(0.1),
            None,
            Some(5),
        );
        assert_eq!(trainer.options().encrypted_feature_column, "Enc");
        assert_eq!(trainer.options().example_weight_column.as_deref(), Some("Weight"));
        assert_eq!(trainer.options().resolved_max_iterations(), 5);
        assert!(trainer.context().is_ok());
    }
}

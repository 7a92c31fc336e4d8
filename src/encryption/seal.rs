//! Column estimator that encrypts a plaintext feature column, or decrypts an
//! encrypted column back into plaintext.

use crate::dataset::{Column, EncryptedColumn, EncryptedFrame, Frame};
use crate::encryption::context::{EncryptionContext, EncryptionParameters};
use crate::encryption::provider::{decrypt_vector, encrypt_vector, CiphertextProvider, FromKeyFile};
use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Unfitted encrypt/decrypt column estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealEstimator {
    /// `true` encrypts `input_column`, `false` decrypts it
    pub encrypt: bool,
    pub parameters: EncryptionParameters,
    pub output_column: String,
    pub input_column: String,
}

impl SealEstimator {
    /// `input_column` defaults to `output_column`
    pub fn new(
        encrypt: bool,
        parameters: EncryptionParameters,
        output_column: impl Into<String>,
        input_column: Option<String>,
    ) -> Self {
        let output_column = output_column.into();
        let input_column = input_column.unwrap_or_else(|| output_column.clone());
        Self {
            encrypt,
            parameters,
            output_column,
            input_column,
        }
    }

    pub fn context(&self) -> Result<Arc<EncryptionContext>> {
        EncryptionContext::new(self.parameters.clone())
    }

    /// Load the provider from the configured key file
    pub fn fit<P>(&self) -> Result<SealTransformer<P>>
    where
        P: CiphertextProvider + FromKeyFile,
    {
        let provider = P::from_key_file(self.context()?)?;
        self.fit_with_provider(Arc::new(provider))
    }

    /// Bind to an existing provider; its context must match `parameters`
    pub fn fit_with_provider<P: CiphertextProvider>(&self, provider: Arc<P>) -> Result<SealTransformer<P>> {
        self.parameters.validate()?;
        provider.context().check_parameters(&self.parameters)?;
        Ok(SealTransformer {
            estimator: self.clone(),
            provider,
        })
    }
}

/// Fitted encrypt/decrypt transformer bound to a provider
pub struct SealTransformer<P: CiphertextProvider> {
    estimator: SealEstimator,
    provider: Arc<P>,
}

impl<P: CiphertextProvider> SealTransformer<P> {
    pub fn estimator(&self) -> &SealEstimator {
        &self.estimator
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Encrypt the input column into a new encrypted column.
    ///
    /// Rows are encrypted sequentially so the noise stream, and with it the
    /// ciphertexts, depend only on the key set.
    pub fn encrypt(&self, frame: EncryptedFrame<P::Ciphertext>) -> Result<EncryptedFrame<P::Ciphertext>> {
        if !self.estimator.encrypt {
            return Err(KolosalError::ConfigError(
                "estimator is configured to decrypt, not encrypt".to_string(),
            ));
        }
        let source = frame.plain().column(&self.estimator.input_column)?;
        let rows = source.numeric_rows()?;
        let width = source.width();

        if let Some(expected) = self.provider.context().vector_length() {
            if expected != width {
                return Err(KolosalError::DimensionMismatch {
                    location: format!("column '{}'", self.estimator.input_column),
                    expected,
                    actual: width,
                });
            }
        }
        if let Some(i) = rows.iter().position(|r| r.iter().any(|v| v.is_nan())) {
            return Err(KolosalError::DataError(format!(
                "column '{}' has missing values in row {}; replace them before encrypting",
                self.estimator.input_column, i
            )));
        }

        let bundles = rows
            .iter()
            .map(|row| encrypt_vector(self.provider.as_ref(), row))
            .collect::<Result<Vec<_>>>()?;

        info!(
            column = %self.estimator.output_column,
            rows = bundles.len(),
            width,
            "Encrypted feature column"
        );

        frame.with_encrypted_column(
            self.estimator.output_column.clone(),
            EncryptedColumn::new(width, bundles),
        )
    }

    /// Decrypt the input column into a plaintext vector column. Requires the secret key.
    pub fn decrypt(&self, frame: &EncryptedFrame<P::Ciphertext>) -> Result<Frame> {
        if self.estimator.encrypt {
            return Err(KolosalError::ConfigError(
                "estimator is configured to encrypt, not decrypt".to_string(),
            ));
        }
        if !self.provider.can_decrypt() {
            return Err(KolosalError::KeyUnavailable(
                "decrypting a column requires the secret key".to_string(),
            ));
        }
        let column = frame.encrypted_column(&self.estimator.input_column)?;
        let rows = column
            .rows
            .iter()
            .map(|bundle| decrypt_vector(self.provider.as_ref(), bundle))
            .collect::<Result<Vec<_>>>()?;

        let mut plain = frame.plain().clone();
        plain.add_column(self.estimator.output_column.clone(), Column::vector(rows)?)?;
        Ok(plain)
    }
}

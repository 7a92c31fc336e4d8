//! Error types for the Kolosal encrypted training stack

use thiserror::Error;

/// Result type alias for Kolosal operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Main error type for the Kolosal encrypted training stack
#[derive(Error, Debug)]
pub enum KolosalError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A ciphertext's noise budget fell below the configured floor.
    /// The run is aborted and no partial model is produced.
    #[error("Noise budget exhausted during {stage}: budget {budget} bits is below floor {floor} bits")]
    NoiseBudgetExhausted {
        stage: String,
        budget: u32,
        floor: u32,
    },

    /// Encoded vector length differs from the configured one.
    #[error("Dimension mismatch for {location}: expected {expected}, got {actual}")]
    DimensionMismatch {
        location: String,
        expected: usize,
        actual: usize,
    },

    /// Secret key material is required but was not supplied.
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    /// An arithmetic provider operation failed. Reported verbatim, never retried.
    #[error("Provider operation '{operation}' failed: {message}")]
    ProviderOperationFailure { operation: String, message: String },

    #[error("Training cancelled before step {step}")]
    Cancelled { step: usize },

    #[error("Arity mismatch for {estimator}: expected {expected}, got {inputs} input(s) / {outputs} output(s)")]
    ArityMismatch {
        estimator: String,
        expected: String,
        inputs: usize,
        outputs: usize,
    },
}

impl KolosalError {
    /// Shorthand for a provider failure.
    pub fn provider(operation: impl Into<String>, message: impl Into<String>) -> Self {
        KolosalError::ProviderOperationFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an invalid parameter.
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        KolosalError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for KolosalError {
    fn from(err: ndarray::ShapeError) -> Self {
        KolosalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KolosalError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KolosalError = io_err.into();
        assert!(matches!(err, KolosalError::IoError(_)));
    }

    #[test]
    fn test_noise_budget_display() {
        let err = KolosalError::NoiseBudgetExhausted {
            stage: "weight update".to_string(),
            budget: 3,
            floor: 10,
        };
        assert_eq!(
            err.to_string(),
            "Noise budget exhausted during weight update: budget 3 bits is below floor 10 bits"
        );
    }

    #[test]
    fn test_provider_shorthand() {
        let err = KolosalError::provider("add", "level mismatch");
        assert!(matches!(
            err,
            KolosalError::ProviderOperationFailure { ref operation, .. } if operation == "add"
        ));
        assert_eq!(err.to_string(), "Provider operation 'add' failed: level mismatch");
    }
}

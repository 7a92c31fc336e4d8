//! Encryption parameters and the shared, read-only encryption context

use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Smallest and largest supported polynomial modulus degree
pub const MIN_POLY_MODULUS_DEGREE: u64 = 1024;
pub const MAX_POLY_MODULUS_DEGREE: u64 = 32768;

/// Bit-size bounds for a single coefficient modulus
pub const MIN_MODULUS_BITS: u32 = 20;
pub const MAX_MODULUS_BITS: u32 = 60;

/// Maximum total coefficient modulus bits for 128-bit security
pub fn max_coeff_modulus_bits(poly_modulus_degree: u64) -> Option<u32> {
    match poly_modulus_degree {
        1024 => Some(27),
        2048 => Some(54),
        4096 => Some(109),
        8192 => Some(218),
        16384 => Some(438),
        32768 => Some(881),
        _ => None,
    }
}

/// User-facing encryption parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionParameters {
    /// Polynomial modulus degree N (power of two)
    pub poly_modulus_degree: u64,
    /// Bit sizes of the coefficient modulus chain; the last entry is the special prime
    pub coeff_modulus_bits: Vec<u32>,
    /// Fixed-point encoding scale
    pub scale: f64,
    /// Key file handed to the provider, never parsed here
    pub key_file: Option<PathBuf>,
    /// Expected encoded vector length, if known up front
    pub vector_length: Option<usize>,
}

impl Default for EncryptionParameters {
    fn default() -> Self {
        Self {
            poly_modulus_degree: 8192,
            coeff_modulus_bits: vec![60, 40, 40, 60],
            scale: 2f64.powi(40),
            key_file: None,
            vector_length: None,
        }
    }
}

impl EncryptionParameters {
    /// Create parameters from degree, modulus bit sizes and scale
    pub fn new(poly_modulus_degree: u64, coeff_modulus_bits: Vec<u32>, scale: f64) -> Self {
        Self {
            poly_modulus_degree,
            coeff_modulus_bits,
            scale,
            ..Default::default()
        }
    }

    /// Set the key file path
    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    /// Set the expected vector length
    pub fn with_vector_length(mut self, length: usize) -> Self {
        self.vector_length = Some(length);
        self
    }

    /// Validate parameters against the supported ranges and the security bound
    pub fn validate(&self) -> Result<()> {
        let n = self.poly_modulus_degree;
        if !n.is_power_of_two() || !(MIN_POLY_MODULUS_DEGREE..=MAX_POLY_MODULUS_DEGREE).contains(&n) {
            return Err(KolosalError::invalid_parameter(
                "poly_modulus_degree",
                n,
                format!(
                    "must be a power of two between {} and {}",
                    MIN_POLY_MODULUS_DEGREE, MAX_POLY_MODULUS_DEGREE
                ),
            ));
        }

        if self.coeff_modulus_bits.len() < 2 {
            return Err(KolosalError::invalid_parameter(
                "coeff_modulus_bits",
                format!("{:?}", self.coeff_modulus_bits),
                "need at least one data modulus and the special modulus",
            ));
        }

        if let Some(&bad) = self
            .coeff_modulus_bits
            .iter()
            .find(|&&b| !(MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&b))
        {
            return Err(KolosalError::invalid_parameter(
                "coeff_modulus_bits",
                bad,
                format!("each modulus must be {}..={} bits", MIN_MODULUS_BITS, MAX_MODULUS_BITS),
            ));
        }

        let total: u32 = self.coeff_modulus_bits.iter().sum();
        let max_bits = max_coeff_modulus_bits(n).unwrap_or(0);
        if total > max_bits {
            return Err(KolosalError::invalid_parameter(
                "coeff_modulus_bits",
                total,
                format!("total exceeds {} bits allowed for degree {}", max_bits, n),
            ));
        }

        if !self.scale.is_finite() || self.scale <= 1.0 {
            return Err(KolosalError::invalid_parameter(
                "scale",
                self.scale,
                "must be finite and greater than 1",
            ));
        }

        if self.scale.log2() >= f64::from(self.coeff_modulus_bits[0]) {
            return Err(KolosalError::invalid_parameter(
                "scale",
                self.scale,
                format!("must be below the first modulus ({} bits)", self.coeff_modulus_bits[0]),
            ));
        }

        if self.vector_length == Some(0) {
            return Err(KolosalError::invalid_parameter(
                "vector_length",
                0,
                "must be positive",
            ));
        }

        Ok(())
    }
}

/// Validated encryption context, fixed for the lifetime of a run.
///
/// Levels count data moduli below the special prime: a fresh ciphertext sits
/// at `max_level()`, each rescale drops one level, level 0 keeps only the
/// first modulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptionContext {
    params: EncryptionParameters,
}

impl EncryptionContext {
    /// Validate parameters and build a shareable context
    pub fn new(params: EncryptionParameters) -> Result<Arc<Self>> {
        params.validate()?;
        Ok(Arc::new(Self { params }))
    }

    pub fn params(&self) -> &EncryptionParameters {
        &self.params
    }

    pub fn poly_modulus_degree(&self) -> u64 {
        self.params.poly_modulus_degree
    }

    /// Number of SIMD slots (N/2)
    pub fn slot_count(&self) -> usize {
        (self.params.poly_modulus_degree / 2) as usize
    }

    pub fn scale(&self) -> f64 {
        self.params.scale
    }

    pub fn coeff_modulus_bits(&self) -> &[u32] {
        &self.params.coeff_modulus_bits
    }

    pub fn key_file(&self) -> Option<&Path> {
        self.params.key_file.as_deref()
    }

    pub fn vector_length(&self) -> Option<usize> {
        self.params.vector_length
    }

    /// Highest level (fresh ciphertexts)
    pub fn max_level(&self) -> usize {
        self.params.coeff_modulus_bits.len() - 2
    }

    /// Total data-modulus bits available at `level`
    pub fn modulus_bits_at(&self, level: usize) -> u32 {
        let end = level.min(self.max_level()) + 1;
        self.params.coeff_modulus_bits[..end].iter().sum()
    }

    /// Bits removed by rescaling away from `level`
    pub fn rescale_bits_at(&self, level: usize) -> u32 {
        self.params.coeff_modulus_bits[level.min(self.max_level())]
    }

    /// Reject parameters describing a different scheme instance than this context
    pub fn check_parameters(&self, params: &EncryptionParameters) -> Result<()> {
        if self.params.poly_modulus_degree != params.poly_modulus_degree
            || self.params.coeff_modulus_bits != params.coeff_modulus_bits
            || self.params.scale != params.scale
        {
            return Err(KolosalError::ConfigError(format!(
                "provider uses N={} moduli={:?} scale=2^{:.1}, expected N={} moduli={:?} scale=2^{:.1}",
                self.params.poly_modulus_degree,
                self.params.coeff_modulus_bits,
                self.params.scale.log2(),
                params.poly_modulus_degree,
                params.coeff_modulus_bits,
                params.scale.log2()
            )));
        }
        Ok(())
    }

    /// Number of ciphertexts needed for a vector of `length` values
    pub fn chunk_count(&self, length: usize) -> usize {
        length.div_ceil(self.slot_count()).max(1)
    }
}

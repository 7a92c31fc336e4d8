//! Ciphertext arithmetic provider interface
//!
//! The training core never touches ciphertext internals. Everything goes
//! through [`CiphertextProvider`], so the SDCA loop can run on top of any
//! CKKS-style backend or on the [`SimulatedCkksProvider`] used in tests.
//!
//! [`SimulatedCkksProvider`]: crate::encryption::SimulatedCkksProvider

use crate::encryption::context::EncryptionContext;
use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// Homomorphic arithmetic over fixed-point-encoded vectors.
///
/// Contract:
/// - every `multiply`/`multiply_plain` result must be rescaled before it is
///   multiplied again;
/// - `add` and `multiply` need operands at the same level and scale;
/// - `noise_budget` never increases across operations on the same lineage.
pub trait CiphertextProvider: Send + Sync {
    type Ciphertext: Clone + Debug + Send + Sync;

    /// Context the provider was built for
    fn context(&self) -> &EncryptionContext;

    /// Encrypt up to `slot_count` values at the top level
    fn encrypt(&self, values: &[f64]) -> Result<Self::Ciphertext>;

    /// Decrypt all slots. Requires the secret key.
    fn decrypt(&self, ciphertext: &Self::Ciphertext) -> Result<Vec<f64>>;

    /// Whether secret-key material is present
    fn can_decrypt(&self) -> bool;

    /// Decrypt slot 0 only, through the reveal channel available to
    /// evaluation-key holders
    fn reveal_scalar(&self, ciphertext: &Self::Ciphertext) -> Result<f64>;

    fn add(&self, lhs: &Self::Ciphertext, rhs: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn multiply_plain(&self, ciphertext: &Self::Ciphertext, scalar: f64) -> Result<Self::Ciphertext>;

    fn multiply(&self, lhs: &Self::Ciphertext, rhs: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn rescale(&self, ciphertext: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    /// Drop to a lower level without changing the scale
    fn mod_switch_to(&self, ciphertext: &Self::Ciphertext, level: usize) -> Result<Self::Ciphertext>;

    /// Rotate-and-sum so slot 0 holds the sum of all slots
    fn sum_slots(&self, ciphertext: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn level(&self, ciphertext: &Self::Ciphertext) -> usize;

    fn noise_budget(&self, ciphertext: &Self::Ciphertext) -> u32;

    /// Re-encrypt or bootstrap a ciphertext to restore its noise budget
    fn refresh(&self, _ciphertext: &Self::Ciphertext) -> Result<Self::Ciphertext> {
        Err(KolosalError::provider(
            "refresh",
            "provider does not support re-encryption",
        ))
    }
}

/// Providers that load their own key material from the context's key file
pub trait FromKeyFile: Sized {
    fn from_key_file(context: Arc<EncryptionContext>) -> Result<Self>;
}

/// Encrypted representation of one feature vector, chunked by slot count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiphertextBundle<C> {
    chunks: Vec<C>,
    len: usize,
}

impl<C> CiphertextBundle<C> {
    pub fn new(chunks: Vec<C>, len: usize) -> Self {
        Self { chunks, len }
    }

    /// Encoded vector length
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunks(&self) -> &[C] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn into_chunks(self) -> Vec<C> {
        self.chunks
    }
}

/// Encrypt a vector of any length into a bundle
pub fn encrypt_vector<P: CiphertextProvider + ?Sized>(
    provider: &P,
    values: &[f64],
) -> Result<CiphertextBundle<P::Ciphertext>> {
    if values.is_empty() {
        return Err(KolosalError::InvalidInput("cannot encrypt an empty vector".to_string()));
    }
    let slots = provider.context().slot_count();
    let chunks = values
        .chunks(slots)
        .map(|chunk| provider.encrypt(chunk))
        .collect::<Result<Vec<_>>>()?;
    Ok(CiphertextBundle::new(chunks, values.len()))
}

/// Decrypt a bundle back into a vector of its encoded length
pub fn decrypt_vector<P: CiphertextProvider + ?Sized>(
    provider: &P,
    bundle: &CiphertextBundle<P::Ciphertext>,
) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(bundle.len());
    for chunk in bundle.chunks() {
        values.extend(provider.decrypt(chunk)?);
    }
    if values.len() < bundle.len() {
        return Err(KolosalError::DimensionMismatch {
            location: "decrypted bundle".to_string(),
            expected: bundle.len(),
            actual: values.len(),
        });
    }
    values.truncate(bundle.len());
    Ok(values)
}

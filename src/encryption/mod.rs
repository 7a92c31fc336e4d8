//! Encryption context, keys and ciphertext arithmetic
//!
//! - [`EncryptionContext`] - validated CKKS parameters shared by a run
//! - [`CiphertextProvider`] - the arithmetic seam the trainer is written against
//! - [`SimulatedCkksProvider`] - deterministic provider with CKKS bookkeeping
//! - [`SealEstimator`] - encrypt or decrypt a frame column

mod context;
mod keys;
mod provider;
mod seal;
mod simulated;

pub use context::{
    max_coeff_modulus_bits, EncryptionContext, EncryptionParameters, MAX_MODULUS_BITS,
    MAX_POLY_MODULUS_DEGREE, MIN_MODULUS_BITS, MIN_POLY_MODULUS_DEGREE,
};
pub use keys::{GaloisKeys, KeyGenerator, KeySet, PublicKey, SecretKey, KEY_FILE_VERSION};
pub use provider::{decrypt_vector, encrypt_vector, CiphertextBundle, CiphertextProvider, FromKeyFile};
pub use seal::{SealEstimator, SealTransformer};
pub use simulated::{SimulatedCiphertext, SimulatedCkksProvider};

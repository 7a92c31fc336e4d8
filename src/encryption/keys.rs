//! Key material and key files for the simulated provider

use crate::encryption::context::EncryptionContext;
use crate::error::{KolosalError, Result};
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Key file format version
pub const KEY_FILE_VERSION: u32 = 1;

/// Public (encryption) key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub key_id: u64,
}

/// Galois keys enabling slot rotations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GaloisKeys {
    pub key_id: u64,
    /// Rotation steps covered (powers of two up to half the slot count)
    pub steps: Vec<usize>,
}

/// Secret (decryption) key. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey {
    pub key_id: u64,
    material: u64,
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("key_id", &self.key_id)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Full or partial key set, bound to the parameters it was generated for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySet {
    pub format_version: u32,
    pub poly_modulus_degree: u64,
    pub coeff_modulus_bits: Vec<u32>,
    pub public_key: Option<PublicKey>,
    pub galois_keys: Option<GaloisKeys>,
    pub secret_key: Option<SecretKey>,
    /// Seed for encryption noise sampling
    pub noise_seed: u64,
}

impl KeySet {
    /// Copy without the secret key, suitable for the training side
    pub fn evaluation_only(&self) -> KeySet {
        KeySet {
            secret_key: None,
            ..self.clone()
        }
    }

    pub fn has_secret_key(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Key id shared by all keys in the set
    pub fn key_id(&self) -> Option<u64> {
        self.public_key
            .as_ref()
            .map(|k| k.key_id)
            .or_else(|| self.galois_keys.as_ref().map(|k| k.key_id))
            .or_else(|| self.secret_key.as_ref().map(|k| k.key_id))
    }

    /// Reject key sets generated for other parameters
    pub fn check_compatible(&self, context: &EncryptionContext) -> Result<()> {
        if self.format_version != KEY_FILE_VERSION {
            return Err(KolosalError::ConfigError(format!(
                "Unsupported key file version {} (expected {})",
                self.format_version, KEY_FILE_VERSION
            )));
        }
        if self.poly_modulus_degree != context.poly_modulus_degree()
            || self.coeff_modulus_bits != context.coeff_modulus_bits()
        {
            return Err(KolosalError::ConfigError(format!(
                "Key set was generated for N={} moduli={:?}, context uses N={} moduli={:?}",
                self.poly_modulus_degree,
                self.coeff_modulus_bits,
                context.poly_modulus_degree(),
                context.coeff_modulus_bits()
            )));
        }
        let ids: Vec<u64> = [
            self.public_key.as_ref().map(|k| k.key_id),
            self.galois_keys.as_ref().map(|k| k.key_id),
            self.secret_key.as_ref().map(|k| k.key_id),
        ]
        .into_iter()
        .flatten()
        .collect();
        if ids.windows(2).any(|w| w[0] != w[1]) {
            return Err(KolosalError::ConfigError(
                "Key set mixes keys from different generations".to_string(),
            ));
        }
        Ok(())
    }

    /// Save as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Load from JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let keys: KeySet = serde_json::from_reader(BufReader::new(file))?;
        Ok(keys)
    }
}

/// Generates key sets for a context
pub struct KeyGenerator<'a> {
    context: &'a EncryptionContext,
}

impl<'a> KeyGenerator<'a> {
    pub fn new(context: &'a EncryptionContext) -> Self {
        Self { context }
    }

    /// Generate a full key set (public, Galois and secret keys) from a seed
    pub fn generate(&self, seed: u64) -> KeySet {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let key_id: u64 = rng.gen();
        let material: u64 = rng.gen();
        let noise_seed: u64 = rng.gen();

        let half = self.context.slot_count();
        let steps = std::iter::successors(Some(1usize), |s| s.checked_mul(2))
            .take_while(|&s| s < half)
            .collect();

        KeySet {
            format_version: KEY_FILE_VERSION,
            poly_modulus_degree: self.context.poly_modulus_degree(),
            coeff_modulus_bits: self.context.coeff_modulus_bits().to_vec(),
            public_key: Some(PublicKey { key_id }),
            galois_keys: Some(GaloisKeys { key_id, steps }),
            secret_key: Some(SecretKey { key_id, material }),
            noise_seed,
        }
    }
}

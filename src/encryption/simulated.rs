//! Simulated CKKS provider
//!
//! Keeps slot values in the clear but enforces the bookkeeping a real CKKS
//! backend imposes: levels, scales, mandatory rescaling after a multiply,
//! key availability and a conservative noise estimate. Encryption adds
//! seeded Gaussian noise and fixed-point rounding, so results are
//! approximate in the same way as with a real scheme while staying fully
//! deterministic for a given key set. Fresh encryptions draw from one
//! sequential stream; re-encryption noise is seeded from the ciphertext
//! being refreshed.

use crate::encryption::context::EncryptionContext;
use crate::encryption::keys::{KeyGenerator, KeySet};
use crate::encryption::provider::{CiphertextProvider, FromKeyFile};
use crate::error::{KolosalError, Result};
use parking_lot::Mutex;
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Standard deviation of fresh encryption noise per coefficient
const ENCRYPTION_NOISE_STD: f64 = 3.2;

/// Simulated ciphertext: slot values plus CKKS metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedCiphertext {
    key_id: u64,
    level: usize,
    scale: f64,
    /// log2 of the noise standard deviation, in encoded units
    noise_bits: f64,
    pending_rescale: bool,
    values: Vec<f64>,
}

impl SimulatedCiphertext {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn noise_bits(&self) -> f64 {
        self.noise_bits
    }

    pub fn is_pending_rescale(&self) -> bool {
        self.pending_rescale
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn magnitude_bits(&self) -> f64 {
        let max_abs = self.values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        (1.0 + max_abs).log2()
    }
}

/// Combine two independent noise terms given as log2 standard deviations
fn noise_sum(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + 0.5 * (1.0 + (2.0 * (lo - hi)).exp2()).log2()
}

/// CKKS-style provider backed by plaintext slots
pub struct SimulatedCkksProvider {
    context: Arc<EncryptionContext>,
    keys: KeySet,
    key_id: u64,
    rng: Mutex<ChaCha20Rng>,
}

impl std::fmt::Debug for SimulatedCkksProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedCkksProvider")
            .field("poly_modulus_degree", &self.context.poly_modulus_degree())
            .field("key_id", &self.key_id)
            .field("has_secret_key", &self.keys.has_secret_key())
            .finish()
    }
}

impl SimulatedCkksProvider {
    /// Build a provider from a context and a compatible key set
    pub fn new(context: Arc<EncryptionContext>, keys: KeySet) -> Result<Self> {
        keys.check_compatible(&context)?;
        let key_id = keys
            .key_id()
            .ok_or_else(|| KolosalError::ConfigError("Key set contains no keys".to_string()))?;
        let rng = Mutex::new(ChaCha20Rng::seed_from_u64(keys.noise_seed));
        Ok(Self {
            context,
            keys,
            key_id,
            rng,
        })
    }

    /// Generate a full key set from `seed` and build a provider around it
    pub fn generate(context: Arc<EncryptionContext>, seed: u64) -> Result<Self> {
        let keys = KeyGenerator::new(&context).generate(seed);
        Self::new(context, keys)
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    fn fresh_noise_bits(&self) -> f64 {
        (ENCRYPTION_NOISE_STD * (self.context.poly_modulus_degree() as f64).sqrt()).log2()
    }

    fn rounding_noise_bits(&self) -> f64 {
        0.5 * (self.context.poly_modulus_degree() as f64 / 12.0).log2()
    }

    fn check_key(&self, operation: &str, ct: &SimulatedCiphertext) -> Result<()> {
        if ct.key_id != self.key_id {
            return Err(KolosalError::provider(
                operation,
                "ciphertext was encrypted under a different key set",
            ));
        }
        Ok(())
    }

    fn check_not_pending(&self, operation: &str, ct: &SimulatedCiphertext) -> Result<()> {
        if ct.pending_rescale {
            return Err(KolosalError::provider(
                operation,
                "rescale required before further multiplication",
            ));
        }
        Ok(())
    }

    fn check_same_level_and_scale(
        &self,
        operation: &str,
        lhs: &SimulatedCiphertext,
        rhs: &SimulatedCiphertext,
    ) -> Result<()> {
        if lhs.level != rhs.level {
            return Err(KolosalError::provider(
                operation,
                format!("level mismatch ({} vs {})", lhs.level, rhs.level),
            ));
        }
        if (lhs.scale - rhs.scale).abs() > lhs.scale * 1e-12 {
            return Err(KolosalError::provider(
                operation,
                format!("scale mismatch (2^{:.3} vs 2^{:.3})", lhs.scale.log2(), rhs.scale.log2()),
            ));
        }
        Ok(())
    }

    fn check_scale_fits(&self, operation: &str, scale: f64, level: usize) -> Result<()> {
        if scale.log2() >= f64::from(self.context.modulus_bits_at(level)) {
            return Err(KolosalError::provider(
                operation,
                format!(
                    "scale 2^{:.1} out of bounds for modulus of {} bits",
                    scale.log2(),
                    self.context.modulus_bits_at(level)
                ),
            ));
        }
        Ok(())
    }

    fn check_decryptable(&self, operation: &str, ct: &SimulatedCiphertext) -> Result<()> {
        if self.noise_budget(ct) == 0 {
            return Err(KolosalError::provider(
                operation,
                "noise budget exhausted, decryption would be unreliable",
            ));
        }
        Ok(())
    }

    /// Noise stream for re-encrypting `ct`, a function of the key set and the ciphertext only
    fn refresh_rng(&self, ct: &SimulatedCiphertext) -> ChaCha20Rng {
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        let seed = ct
            .values
            .iter()
            .map(|v| v.to_bits())
            .chain([ct.level as u64, ct.scale.to_bits()])
            .fold(self.keys.noise_seed, |h, bits| (h ^ bits).wrapping_mul(PRIME));
        ChaCha20Rng::seed_from_u64(seed)
    }

    fn encode<R: Rng + ?Sized>(
        &self,
        values: &[f64],
        level: usize,
        scale: f64,
        rng: &mut R,
    ) -> Result<SimulatedCiphertext> {
        if values.len() > self.context.slot_count() {
            return Err(KolosalError::provider(
                "encrypt",
                format!(
                    "{} values exceed the {} available slots",
                    values.len(),
                    self.context.slot_count()
                ),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(KolosalError::provider("encrypt", "non-finite value"));
        }
        let max_abs = values.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        let limit_bits = f64::from(self.context.modulus_bits_at(level)) - 1.0;
        if max_abs > 0.0 && (max_abs * scale).log2() >= limit_bits {
            return Err(KolosalError::provider(
                "encrypt",
                format!("value {} out of range for the encoding scale", max_abs),
            ));
        }

        let noise_bits = self.fresh_noise_bits();
        let normal = Normal::new(0.0, noise_bits.exp2())
            .map_err(|e| KolosalError::provider("encrypt", e.to_string()))?;
        let encoded = values
            .iter()
            .map(|&v| ((v * scale).round() + normal.sample(&mut *rng)) / scale)
            .collect();

        Ok(SimulatedCiphertext {
            key_id: self.key_id,
            level,
            scale,
            noise_bits,
            pending_rescale: false,
            values: encoded,
        })
    }
}

impl FromKeyFile for SimulatedCkksProvider {
    fn from_key_file(context: Arc<EncryptionContext>) -> Result<Self> {
        let path = context.key_file().ok_or_else(|| {
            KolosalError::ConfigError("Encryption context has no key file configured".to_string())
        })?;
        let keys = KeySet::load(path)?;
        Self::new(context, keys)
    }
}

impl CiphertextProvider for SimulatedCkksProvider {
    type Ciphertext = SimulatedCiphertext;

    fn context(&self) -> &EncryptionContext {
        &self.context
    }

    fn encrypt(&self, values: &[f64]) -> Result<SimulatedCiphertext> {
        if self.keys.public_key.is_none() {
            return Err(KolosalError::KeyUnavailable(
                "public key not loaded; encryption requires the public key".to_string(),
            ));
        }
        let mut rng = self.rng.lock();
        self.encode(values, self.context.max_level(), self.context.scale(), &mut *rng)
    }

    fn decrypt(&self, ct: &SimulatedCiphertext) -> Result<Vec<f64>> {
        if self.keys.secret_key.is_none() {
            return Err(KolosalError::KeyUnavailable(
                "secret key not loaded; full decryption requires the secret key".to_string(),
            ));
        }
        self.check_key("decrypt", ct)?;
        self.check_decryptable("decrypt", ct)?;
        Ok(ct.values.clone())
    }

    fn can_decrypt(&self) -> bool {
        self.keys.has_secret_key()
    }

    fn reveal_scalar(&self, ct: &SimulatedCiphertext) -> Result<f64> {
        if self.keys.galois_keys.is_none() {
            return Err(KolosalError::KeyUnavailable(
                "Galois keys not loaded; scalar reveal requires Galois keys".to_string(),
            ));
        }
        self.check_key("reveal_scalar", ct)?;
        self.check_decryptable("reveal_scalar", ct)?;
        Ok(ct.values.first().copied().unwrap_or(0.0))
    }

    fn add(&self, lhs: &SimulatedCiphertext, rhs: &SimulatedCiphertext) -> Result<SimulatedCiphertext> {
        self.check_key("add", lhs)?;
        self.check_key("add", rhs)?;
        self.check_same_level_and_scale("add", lhs, rhs)?;

        let len = lhs.values.len().max(rhs.values.len());
        let values = (0..len)
            .map(|i| lhs.values.get(i).copied().unwrap_or(0.0) + rhs.values.get(i).copied().unwrap_or(0.0))
            .collect();

        Ok(SimulatedCiphertext {
            key_id: self.key_id,
            level: lhs.level,
            scale: lhs.scale,
            noise_bits: noise_sum(lhs.noise_bits, rhs.noise_bits),
            pending_rescale: lhs.pending_rescale || rhs.pending_rescale,
            values,
        })
    }

    fn multiply_plain(&self, ct: &SimulatedCiphertext, scalar: f64) -> Result<SimulatedCiphertext> {
        self.check_key("multiply_plain", ct)?;
        self.check_not_pending("multiply_plain", ct)?;
        if !scalar.is_finite() {
            return Err(KolosalError::provider("multiply_plain", "non-finite scalar"));
        }

        let plain_scale = self.context.scale();
        let scale = ct.scale * plain_scale;
        self.check_scale_fits("multiply_plain", scale, ct.level)?;

        let encoded = (scalar * plain_scale).round() / plain_scale;
        let values = ct.values.iter().map(|v| v * encoded).collect();

        // Conservative: the encoded scalar is treated as at least one unit of scale.
        let scaled_noise = ct.noise_bits + plain_scale.log2() + scalar.abs().max(1.0).log2();
        let encoding_noise = ct.scale.log2() + ct.magnitude_bits() - 1.0;

        Ok(SimulatedCiphertext {
            key_id: self.key_id,
            level: ct.level,
            scale,
            noise_bits: noise_sum(scaled_noise, encoding_noise),
            pending_rescale: true,
            values,
        })
    }

    fn multiply(&self, lhs: &SimulatedCiphertext, rhs: &SimulatedCiphertext) -> Result<SimulatedCiphertext> {
        self.check_key("multiply", lhs)?;
        self.check_key("multiply", rhs)?;
        self.check_not_pending("multiply", lhs)?;
        self.check_not_pending("multiply", rhs)?;
        self.check_same_level_and_scale("multiply", lhs, rhs)?;

        let scale = lhs.scale * rhs.scale;
        self.check_scale_fits("multiply", scale, lhs.level)?;

        let len = lhs.values.len().max(rhs.values.len());
        let values = (0..len)
            .map(|i| lhs.values.get(i).copied().unwrap_or(0.0) * rhs.values.get(i).copied().unwrap_or(0.0))
            .collect();

        let lhs_term = lhs.noise_bits + rhs.scale.log2() + rhs.magnitude_bits();
        let rhs_term = rhs.noise_bits + lhs.scale.log2() + lhs.magnitude_bits();
        let relin = self.fresh_noise_bits();

        Ok(SimulatedCiphertext {
            key_id: self.key_id,
            level: lhs.level,
            scale,
            noise_bits: noise_sum(noise_sum(lhs_term, rhs_term), relin),
            pending_rescale: true,
            values,
        })
    }

    fn rescale(&self, ct: &SimulatedCiphertext) -> Result<SimulatedCiphertext> {
        self.check_key("rescale", ct)?;
        if ct.level == 0 {
            return Err(KolosalError::provider("rescale", "no modulus left to rescale by"));
        }

        let bits = self.context.rescale_bits_at(ct.level);
        let scale = ct.scale / f64::from(bits).exp2();
        if scale < 1.0 {
            return Err(KolosalError::provider(
                "rescale",
                format!("scale 2^{:.1} too small to drop {} bits", ct.scale.log2(), bits),
            ));
        }

        let values = ct.values.iter().map(|v| (v * scale).round() / scale).collect();

        Ok(SimulatedCiphertext {
            key_id: self.key_id,
            level: ct.level - 1,
            scale,
            noise_bits: noise_sum(ct.noise_bits - f64::from(bits), self.rounding_noise_bits()),
            pending_rescale: false,
            values,
        })
    }

    fn mod_switch_to(&self, ct: &SimulatedCiphertext, level: usize) -> Result<SimulatedCiphertext> {
        self.check_key("mod_switch_to", ct)?;
        if level > ct.level {
            return Err(KolosalError::provider(
                "mod_switch_to",
                format!("cannot switch up from level {} to {}", ct.level, level),
            ));
        }
        Ok(SimulatedCiphertext {
            level,
            ..ct.clone()
        })
    }

    fn sum_slots(&self, ct: &SimulatedCiphertext) -> Result<SimulatedCiphertext> {
        let galois = self.keys.galois_keys.as_ref().ok_or_else(|| {
            KolosalError::KeyUnavailable("Galois keys not loaded; rotations require Galois keys".to_string())
        })?;
        self.check_key("sum_slots", ct)?;
        self.check_not_pending("sum_slots", ct)?;

        let total: f64 = ct.values.iter().sum();
        let key_switch = self.fresh_noise_bits();
        let noise_bits = galois
            .steps
            .iter()
            .fold(ct.noise_bits, |n, _| noise_sum(n + 0.5, key_switch));

        Ok(SimulatedCiphertext {
            key_id: self.key_id,
            level: ct.level,
            scale: ct.scale,
            noise_bits,
            pending_rescale: false,
            values: vec![total],
        })
    }

    fn level(&self, ct: &SimulatedCiphertext) -> usize {
        ct.level
    }

    fn noise_budget(&self, ct: &SimulatedCiphertext) -> u32 {
        let scale_bits = ct.scale.log2();
        let capacity = f64::from(self.context.modulus_bits_at(ct.level)) - scale_bits - 1.0;
        let precision = scale_bits - ct.noise_bits;
        capacity.min(precision).floor().max(0.0) as u32
    }

    fn refresh(&self, ct: &SimulatedCiphertext) -> Result<SimulatedCiphertext> {
        if self.keys.secret_key.is_none() {
            return Err(KolosalError::provider("refresh", "re-encryption requires the secret key"));
        }
        self.check_key("refresh", ct)?;
        self.check_not_pending("refresh", ct)?;
        self.check_decryptable("refresh", ct)?;
        let mut rng = self.refresh_rng(ct);
        self.encode(&ct.values, ct.level, ct.scale, &mut rng)
    }
}

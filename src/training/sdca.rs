//! Encrypted SDCA logistic regression
//!
//! Stochastic dual coordinate ascent where the primal weight vector only
//! ever exists as ciphertext. Per step the trainer
//!
//! 1. computes the encrypted margin `w·x` (multiply, rescale, rotate-and-sum
//!    per chunk, partial sums folded with `add` in chunk order),
//! 2. reveals only that scalar and takes the dual step in plaintext,
//! 3. applies `w ← w + rescale(c·x)` homomorphically,
//! 4. checks the noise budget of every updated weight chunk.
//!
//! The bias is a plaintext scalar: it is a function of labels, weights and
//! revealed margins only.
//!
//! Levels: features arrive fresh at `max_level`, weights live one level
//! below, margins are read at `max_level - 2`.
//!
//! A run never encrypts. Initial weights are derived from the features and
//! refreshes are pure in the ciphertext, so the same store, provider and
//! seed always give the same model.

use crate::dataset::{EncryptedFeatureStore, TrainingExample};
use crate::encryption::{CiphertextBundle, CiphertextProvider, EncryptionContext};
use crate::error::{KolosalError, Result};
use crate::training::config::{EncryptedSdcaOptions, NoisePolicy};
use crate::utils::{CancellationToken, ParallelExecutor, Timer};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info, warn};

/// Budgets this close to the floor are logged once per run
const BUDGET_WARN_MARGIN: u32 = 3;

/// Summary of a finished training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: usize,
    pub steps: usize,
    pub converged: bool,
    /// Largest dual step of the last epoch
    pub final_residual: f64,
    /// Lowest weight noise budget seen after an update
    pub min_weight_budget: u32,
    pub refresh_count: usize,
    pub training_secs: f64,
}

/// Trained model whose weights are still encrypted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedLinearModel<C> {
    weights: CiphertextBundle<C>,
    bias: f64,
    dimension: usize,
    l2_regularization: f64,
    l1_regularization: f64,
    report: TrainingReport,
}

impl<C> EncryptedLinearModel<C> {
    pub fn weights(&self) -> &CiphertextBundle<C> {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn l2_regularization(&self) -> f64 {
        self.l2_regularization
    }

    pub fn l1_regularization(&self) -> f64 {
        self.l1_regularization
    }

    /// Soft-threshold applied to coefficients at materialization
    pub fn l1_threshold(&self) -> f64 {
        self.l1_regularization / self.l2_regularization
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }
}

impl<C: Serialize + DeserializeOwned> EncryptedLinearModel<C> {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Trainer over an [`EncryptedFeatureStore`]
#[derive(Debug, Clone, Default)]
pub struct EncryptedSdcaTrainer {
    options: EncryptedSdcaOptions,
    cancellation: Option<CancellationToken>,
}

impl EncryptedSdcaTrainer {
    pub fn new(options: EncryptedSdcaOptions) -> Self {
        Self {
            options,
            cancellation: None,
        }
    }

    /// Checked before every step
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn options(&self) -> &EncryptedSdcaOptions {
        &self.options
    }

    /// Train on the store. Only evaluation keys are needed.
    pub fn train<P: CiphertextProvider>(
        &self,
        store: &EncryptedFeatureStore<P::Ciphertext>,
        provider: &P,
    ) -> Result<EncryptedLinearModel<P::Ciphertext>> {
        let timer = Timer::start();
        self.options.validate()?;
        if store.is_empty() {
            return Err(KolosalError::DataError("no training examples".to_string()));
        }

        let context = provider.context();
        check_context(context)?;
        let dimension = context
            .vector_length()
            .or_else(|| store.declared_vector_length())
            .or_else(|| store.example(0).map(|e| e.features.len()))
            .unwrap_or(0);
        store.validate_dimension(dimension, context.chunk_count(dimension))?;
        check_feature_levels(store, provider)?;

        let session = Session {
            provider,
            executor: self.options.parallel.executor()?,
            floor: self.options.noise_budget_floor,
            policy: self.options.noise_policy,
            weight_level: context.max_level() - 1,
        };

        let n = store.len();
        let l2 = self.options.resolved_l2(n);
        let l1 = self.options.resolved_l1();
        let lambda_n = l2 * n as f64;
        let max_epochs = self.options.resolved_max_iterations();

        info!(
            examples = n,
            dimension,
            chunks = context.chunk_count(dimension),
            l2,
            l1,
            max_epochs,
            floor = session.floor,
            "Starting encrypted SDCA training"
        );

        let norms = store
            .examples()
            .iter()
            .map(|ex| session.squared_norm(ex))
            .collect::<Result<Vec<f64>>>()?;

        let template = store
            .example(0)
            .ok_or_else(|| KolosalError::DataError("no training examples".to_string()))?;
        let mut weights = session.zero_weights(template)?;
        let mut bias = 0.0;
        let mut alpha = vec![0.0; n];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.options.seed);

        let mut state = RunState {
            min_weight_budget: session.min_budget(&weights),
            ..RunState::default()
        };
        let mut epochs = 0;
        let mut converged = false;
        let mut final_residual = f64::INFINITY;

        for epoch in 0..max_epochs {
            let order = store.epoch_order(&mut rng, self.options.shuffle);
            let mut max_residual = 0.0f64;

            for &i in &order {
                if self.cancellation.as_ref().is_some_and(|t| t.is_cancelled()) {
                    return Err(KolosalError::Cancelled { step: state.steps });
                }
                state.steps += 1;

                let Some(example) = store.example(i) else {
                    continue;
                };
                if example.weight == 0.0 {
                    continue;
                }

                let margin = session.margin(&weights, example)? + bias;
                let y = example.signed_label();
                let invariant = example.weight * (norms[i] + 1.0) / lambda_n;
                let target = y * sigmoid(-y * margin);
                let delta = (target - alpha[i]) / (1.0 + 0.25 * invariant);

                max_residual = max_residual.max(delta.abs());
                if delta == 0.0 {
                    continue;
                }
                alpha[i] += delta;

                let step = example.weight * delta / lambda_n;
                bias += step;
                weights = session.update(weights, example, step)?;
                session.enforce_floor(&mut weights, &mut state)?;
            }

            epochs = epoch + 1;
            final_residual = max_residual;
            debug!(
                epoch = epochs,
                residual = max_residual,
                min_weight_budget = state.min_weight_budget,
                "Epoch finished"
            );

            if max_residual < self.options.convergence_tolerance {
                converged = true;
                break;
            }
        }

        let report = TrainingReport {
            epochs,
            steps: state.steps,
            converged,
            final_residual,
            min_weight_budget: state.min_weight_budget,
            refresh_count: state.refresh_count,
            training_secs: timer.elapsed_secs(),
        };

        info!(
            epochs,
            steps = report.steps,
            converged,
            residual = final_residual,
            refreshes = report.refresh_count,
            secs = report.training_secs,
            "Encrypted SDCA training finished"
        );

        Ok(EncryptedLinearModel {
            weights: CiphertextBundle::new(weights, dimension),
            bias,
            dimension,
            l2_regularization: l2,
            l1_regularization: l1,
            report,
        })
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// The level layout needs two rescales per step, each dropping exactly the
/// encoding scale.
fn check_context(context: &EncryptionContext) -> Result<()> {
    let max_level = context.max_level();
    if max_level < 2 {
        return Err(KolosalError::ConfigError(format!(
            "encrypted training needs at least 3 data moduli, got {}",
            max_level + 1
        )));
    }
    let scale_bits = context.scale().log2();
    if scale_bits.fract() != 0.0 {
        return Err(KolosalError::ConfigError(format!(
            "scale must be a power of two, got {}",
            context.scale()
        )));
    }
    for level in [max_level, max_level - 1] {
        let bits = context.rescale_bits_at(level);
        if f64::from(bits) != scale_bits {
            return Err(KolosalError::ConfigError(format!(
                "modulus at level {} has {} bits but the scale is 2^{}",
                level, bits, scale_bits
            )));
        }
    }
    Ok(())
}

fn check_feature_levels<P: CiphertextProvider>(
    store: &EncryptedFeatureStore<P::Ciphertext>,
    provider: &P,
) -> Result<()> {
    let expected = provider.context().max_level();
    for (i, example) in store.examples().iter().enumerate() {
        if let Some(level) = example
            .features
            .chunks()
            .iter()
            .map(|c| provider.level(c))
            .find(|&l| l != expected)
        {
            return Err(KolosalError::DataError(format!(
                "features of example {} are at level {}, expected fresh ciphertexts at level {}",
                i, level, expected
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct RunState {
    steps: usize,
    min_weight_budget: u32,
    refresh_count: usize,
    warned: bool,
}

struct Session<'a, P: CiphertextProvider> {
    provider: &'a P,
    executor: ParallelExecutor,
    floor: u32,
    policy: NoisePolicy,
    weight_level: usize,
}

impl<'a, P: CiphertextProvider> Session<'a, P> {
    fn check_budget(&self, stage: &str, ct: &P::Ciphertext) -> Result<()> {
        let budget = self.provider.noise_budget(ct);
        if budget < self.floor {
            return Err(KolosalError::NoiseBudgetExhausted {
                stage: stage.to_string(),
                budget,
                floor: self.floor,
            });
        }
        Ok(())
    }

    fn min_budget(&self, weights: &[P::Ciphertext]) -> u32 {
        weights
            .iter()
            .map(|w| self.provider.noise_budget(w))
            .min()
            .unwrap_or(0)
    }

    /// Encrypted inner product of two equally chunked vectors, read at `level - 1`
    fn dot(&self, stage: &str, lhs: &[P::Ciphertext], rhs: &[P::Ciphertext], level: usize) -> Result<f64> {
        let provider = self.provider;
        let partials = self.executor.try_map_range(lhs.len(), |c| {
            let a = align(provider, &lhs[c], level)?;
            let b = align(provider, &rhs[c], level)?;
            self.check_budget(stage, &a)?;
            self.check_budget(stage, &b)?;
            let product = provider.rescale(&provider.multiply(&a, &b)?)?;
            provider.sum_slots(&product)
        })?;

        let mut iter = partials.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| KolosalError::TrainingError("empty ciphertext bundle".to_string()))?;
        let total = iter.try_fold(first, |acc, p| provider.add(&acc, &p))?;
        provider.reveal_scalar(&total)
    }

    fn squared_norm(&self, example: &TrainingExample<P::Ciphertext>) -> Result<f64> {
        let chunks = example.features.chunks();
        let level = self.provider.context().max_level();
        Ok(self.dot("norm computation", chunks, chunks, level)?.max(0.0))
    }

    fn margin(&self, weights: &[P::Ciphertext], example: &TrainingExample<P::Ciphertext>) -> Result<f64> {
        self.dot("prediction", weights, example.features.chunks(), self.weight_level)
    }

    /// Encrypted zeros shaped like `template`. Never encrypts: the run must
    /// not consume the provider's noise stream.
    fn zero_weights(&self, template: &TrainingExample<P::Ciphertext>) -> Result<Vec<P::Ciphertext>> {
        let provider = self.provider;
        template
            .features
            .chunks()
            .iter()
            .map(|chunk| {
                let zero = provider.rescale(&provider.multiply_plain(chunk, 0.0)?)?;
                align(provider, &zero, self.weight_level)
            })
            .collect()
    }

    /// `w + step * x`, chunk by chunk
    fn update(
        &self,
        weights: Vec<P::Ciphertext>,
        example: &TrainingExample<P::Ciphertext>,
        step: f64,
    ) -> Result<Vec<P::Ciphertext>> {
        let provider = self.provider;
        let features = example.features.chunks();
        self.executor.try_map_range(weights.len(), |c| {
            self.check_budget("weight update", &features[c])?;
            let term = provider.rescale(&provider.multiply_plain(&features[c], step)?)?;
            provider.add(&weights[c], &term)
        })
    }

    /// Apply the noise policy to every weight chunk
    fn enforce_floor(&self, weights: &mut [P::Ciphertext], state: &mut RunState) -> Result<()> {
        for (c, chunk) in weights.iter_mut().enumerate() {
            let mut budget = self.provider.noise_budget(chunk);
            if budget < self.floor {
                match self.policy {
                    NoisePolicy::Abort => {
                        return Err(KolosalError::NoiseBudgetExhausted {
                            stage: "weight update".to_string(),
                            budget,
                            floor: self.floor,
                        })
                    }
                    NoisePolicy::Refresh => {
                        *chunk = self.provider.refresh(chunk)?;
                        state.refresh_count += 1;
                        let restored = self.provider.noise_budget(chunk);
                        info!(chunk = c, before = budget, after = restored, "Refreshed weight ciphertext");
                        self.check_budget("weight refresh", chunk)?;
                        budget = restored;
                    }
                }
            } else if !state.warned && budget < self.floor.saturating_add(BUDGET_WARN_MARGIN) {
                warn!(chunk = c, budget, floor = self.floor, "Weight noise budget close to floor");
                state.warned = true;
            }
            state.min_weight_budget = state.min_weight_budget.min(budget);
        }
        Ok(())
    }
}

fn align<P: CiphertextProvider>(provider: &P, ct: &P::Ciphertext, level: usize) -> Result<P::Ciphertext> {
    if provider.level(ct) == level {
        Ok(ct.clone())
    } else {
        provider.mod_switch_to(ct, level)
    }
}

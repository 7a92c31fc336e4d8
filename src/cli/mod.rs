//! Kolosal Encrypted CLI Module
//!
//! Command-line interface for key generation, encrypted training,
//! materialization and prediction over JSON frames.

use clap::{Args, Parser, Subcommand};
use colored::*;
use ndarray::Array1;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::autopipeline::{SuggestedTransform, TransformPipeline};
use crate::catalog::{BinaryClassificationCatalog, TransformsCatalog};
use crate::dataset::{Column, EncryptedFrame, Frame};
use crate::encryption::{
    CiphertextProvider, EncryptionContext, EncryptionParameters, FromKeyFile, KeyGenerator,
    SimulatedCiphertext, SimulatedCkksProvider,
};
use crate::training::{EncryptedLinearModel, EncryptedSdcaOptions, LinearBinaryModel, ModelMaterializer};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-encrypted")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Encrypted logistic regression training")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Encryption parameters shared by several commands
#[derive(Args, Debug, Clone)]
pub struct EncryptionArgs {
    /// Polynomial modulus degree
    #[arg(long, default_value_t = 8192)]
    pub poly_modulus_degree: u64,

    /// Coefficient modulus bit sizes, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = vec![60u32, 40, 40, 60])]
    pub coeff_moduli: Vec<u32>,

    /// Encoding scale as a power of two
    #[arg(long, default_value_t = 40)]
    pub scale_bits: i32,
}

impl EncryptionArgs {
    pub fn parameters(&self, key_file: Option<&Path>) -> EncryptionParameters {
        let params = EncryptionParameters::new(
            self.poly_modulus_degree,
            self.coeff_moduli.clone(),
            2f64.powi(self.scale_bits),
        );
        match key_file {
            Some(path) => params.with_key_file(path),
            None => params,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a key file and an evaluation-only copy
    Keygen {
        #[command(flatten)]
        encryption: EncryptionArgs,

        /// Seed for key generation
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Full key file (includes the secret key)
        #[arg(short, long)]
        output: PathBuf,

        /// Evaluation-only key file (no secret key)
        #[arg(long)]
        eval_output: Option<PathBuf>,
    },

    /// Encrypt features and train an encrypted logistic regression model
    Train {
        /// Input frame (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Feature columns to concatenate, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        /// Label column name
        #[arg(short, long, default_value = "Label")]
        label: String,

        /// Example weight column name
        #[arg(long)]
        weight: Option<String>,

        /// Key file
        #[arg(short, long)]
        keys: PathBuf,

        #[command(flatten)]
        encryption: EncryptionArgs,

        /// Trainer options (JSON); flags below override it
        #[arg(long)]
        options: Option<PathBuf>,

        /// L2 regularization
        #[arg(long)]
        l2: Option<f64>,

        /// L1 regularization
        #[arg(long)]
        l1: Option<f64>,

        /// Maximum passes over the data
        #[arg(long)]
        iterations: Option<usize>,

        /// Output file for the encrypted model
        #[arg(short, long)]
        output: PathBuf,

        /// Output file for the decrypted model (needs the secret key)
        #[arg(long)]
        model_output: Option<PathBuf>,
    },

    /// Decrypt an encrypted model into a plaintext model
    Materialize {
        /// Encrypted model file
        #[arg(short, long)]
        model: PathBuf,

        /// Key file with the secret key
        #[arg(short, long)]
        keys: PathBuf,

        #[command(flatten)]
        encryption: EncryptionArgs,

        /// Output plaintext model file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Score a frame with a plaintext model
    Predict {
        /// Plaintext model file
        #[arg(short, long)]
        model: PathBuf,

        /// Input frame (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Feature columns to concatenate, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        features: Vec<String>,

        /// Label column used to report accuracy, if present
        #[arg(short, long, default_value = "Label")]
        label: String,

        /// Output frame with predictions
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show frame information
    Info {
        /// Input frame (JSON)
        #[arg(short, long)]
        data: PathBuf,
    },
}

// ─── Helpers ───────────────────────────────────────────────────────────────────

fn load_frame(path: &Path) -> anyhow::Result<Frame> {
    step_run("Loading data");
    let frame = Frame::from_json_file(path)?;
    step_done(&format!("{} rows × {} cols", frame.row_count(), frame.column_count()));
    Ok(frame)
}

fn concatenate_features(frame: &Frame, features: &[String], output: &str) -> anyhow::Result<Frame> {
    let inputs: Vec<&str> = features.iter().map(String::as_str).collect();
    let mut pipeline = TransformPipeline::new()
        .with_transform(SuggestedTransform::column_concatenating(&inputs, output)?);
    Ok(pipeline.fit_transform(frame)?)
}

fn load_provider(encryption: &EncryptionArgs, keys: &Path) -> anyhow::Result<SimulatedCkksProvider> {
    let context = EncryptionContext::new(encryption.parameters(Some(keys)))?;
    Ok(SimulatedCkksProvider::from_key_file(context)?)
}

fn accuracy(model: &LinearBinaryModel, frame: &Frame, features: &str, label: &str) -> anyhow::Result<Option<f64>> {
    if !frame.contains(label) {
        return Ok(None);
    }
    let x = frame.feature_matrix(features)?;
    let y = Array1::from(frame.column(label)?.scalar_values()?);
    Ok(Some(model.score(&x, &y)?))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_keygen(
    encryption: &EncryptionArgs,
    seed: u64,
    output: &Path,
    eval_output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Keygen");

    let context = EncryptionContext::new(encryption.parameters(None))?;
    let keys = KeyGenerator::new(&context).generate(seed);

    keys.save(output)?;
    step_ok(&format!("Key set → {}", output.display()));
    if let Some(path) = eval_output {
        keys.evaluation_only().save(path)?;
        step_ok(&format!("Evaluation keys → {}", path.display()));
    }

    println!();
    kv("Slots", &context.slot_count().to_string());
    kv("Levels", &(context.max_level() + 1).to_string());
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    data: &Path,
    features: &[String],
    label: &str,
    weight: Option<&str>,
    keys: &Path,
    encryption: &EncryptionArgs,
    options_path: Option<&Path>,
    l2: Option<f64>,
    l1: Option<f64>,
    iterations: Option<usize>,
    output: &Path,
    model_output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");

    let mut options = match options_path {
        Some(path) => EncryptedSdcaOptions::from_json_file(path)?,
        None => EncryptedSdcaOptions::default(),
    };
    options.label_column = label.to_string();
    if let Some(w) = weight {
        options.example_weight_column = Some(w.to_string());
    }
    options.l2_regularization = l2.or(options.l2_regularization);
    options.l1_regularization = l1.or(options.l1_regularization);
    options.maximum_number_of_iterations = iterations.or(options.maximum_number_of_iterations);

    let frame = load_frame(data)?;
    let frame = concatenate_features(&frame, features, &options.feature_column)?;

    step_run("Loading keys");
    let provider = Arc::new(load_provider(encryption, keys)?);
    step_done(if provider.can_decrypt() { "full key set" } else { "evaluation keys" });

    step_run("Encrypting features");
    let start = Instant::now();
    let parameters = encryption.parameters(Some(keys));
    let seal = TransformsCatalog::encrypt_features(
        true,
        parameters.scale,
        parameters.poly_modulus_degree,
        keys,
        parameters.coeff_modulus_bits.clone(),
        &options.encrypted_feature_column,
        Some(&options.feature_column),
    )
    .fit_with_provider(provider.clone())?;
    let encrypted = seal.encrypt(EncryptedFrame::from(frame.clone()))?;
    step_done(&format!("{:?}", start.elapsed()));

    step_run(&format!("Training {}", "encrypted SDCA".cyan()));
    let trainer = BinaryClassificationCatalog::encrypted_sdca_logistic_regression_with_options(
        parameters,
        options.clone(),
    );
    let model = trainer.fit(&encrypted, provider.as_ref())?;
    let report = model.report();
    step_done(&format!("{:.3}s", report.training_secs));

    model.save(output)?;
    step_ok(&format!("Encrypted model → {}", output.display()));

    println!();
    kv("Epochs", &report.epochs.to_string());
    kv("Converged", &report.converged.to_string());
    kv("Residual", &format!("{:.2e}", report.final_residual));
    kv("Min budget", &format!("{} bits", report.min_weight_budget));

    if let Some(path) = model_output {
        if provider.can_decrypt() {
            let plain = ModelMaterializer::materialize(&model, provider.as_ref())?;
            plain.save(path)?;
            if let Some(acc) = accuracy(&plain, &frame, &options.feature_column, &options.label_column)? {
                kv("Train accuracy", &format!("{:.4}", acc));
            }
            println!();
            step_ok(&format!("Plaintext model → {}", path.display()));
        } else {
            println!();
            println!("  {}", "Key file has no secret key; skipping materialization".yellow());
        }
    }

    println!();
    Ok(())
}

pub fn cmd_materialize(
    model_path: &Path,
    keys: &Path,
    encryption: &EncryptionArgs,
    output: &Path,
) -> anyhow::Result<()> {
    section("Materialize");

    let model: EncryptedLinearModel<SimulatedCiphertext> = EncryptedLinearModel::load(model_path)?;
    let provider = load_provider(encryption, keys)?;

    step_run("Decrypting weights");
    let plain = ModelMaterializer::materialize(&model, &provider)?;
    step_done(&format!("{} coefficients", plain.n_features()));

    plain.save(output)?;
    step_ok(&format!("Plaintext model → {}", output.display()));
    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data: &Path,
    features: &[String],
    label: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    let model = LinearBinaryModel::load(model_path)?;
    let frame = load_frame(data)?;
    let feature_column = "Features";
    let frame = concatenate_features(&frame, features, feature_column)?;

    let x = frame.feature_matrix(feature_column)?;
    let proba = model.predict_proba(&x)?;
    let predicted = proba.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 });

    println!();
    kv("Rows", &proba.len().to_string());
    kv("Positive", &predicted.iter().filter(|&&p| p > 0.5).count().to_string());
    if let Some(acc) = accuracy(&model, &frame, feature_column, label)? {
        kv("Accuracy", &format!("{:.4}", acc));
    }

    if let Some(path) = output {
        let scored = frame
            .with_column("Probability", Column::scalar(proba.to_vec()))?
            .with_column("PredictedLabel", Column::scalar(predicted.to_vec()))?;
        scored.to_json_file(path)?;
        println!();
        step_ok(&format!("Predictions → {}", path.display()));
    }

    println!();
    Ok(())
}

pub fn cmd_info(data: &Path) -> anyhow::Result<()> {
    section("Info");

    let frame = load_frame(data)?;
    println!();
    println!("  {:<20} {:>8} {:>8} {:>8}", muted("Column"), muted("Kind"), muted("Width"), muted("Missing"));
    println!("  {}", dim(&"─".repeat(48)));
    for (name, column) in frame.columns() {
        let missing = match column {
            Column::Scalar { values } => values.iter().filter(|v| v.is_nan()).count(),
            Column::Vector { rows, .. } => rows.iter().filter(|r| r.iter().any(|v| v.is_nan())).count(),
            Column::Text { values } => values.iter().filter(|v| v.is_none()).count(),
            Column::Key { values, .. } => values.iter().filter(|&&k| k == 0).count(),
        };
        println!("  {:<20} {:>8} {:>8} {:>8}", name, column.kind(), column.width(), missing);
    }
    println!();
    Ok(())
}

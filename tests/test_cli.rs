//! Integration test: CLI commands over key files and JSON frames

use kolosal_encrypted::cli::{cmd_info, cmd_keygen, cmd_materialize, cmd_predict, cmd_train, EncryptionArgs};
use kolosal_encrypted::dataset::{Column, Frame};
use kolosal_encrypted::encryption::{KeySet, SimulatedCiphertext};
use kolosal_encrypted::training::{EncryptedLinearModel, LinearBinaryModel};
use kolosal_encrypted::KolosalError;
use std::path::Path;

fn encryption_args() -> EncryptionArgs {
    EncryptionArgs {
        poly_modulus_degree: 8192,
        coeff_moduli: vec![60, 40, 40, 60],
        scale_bits: 40,
    }
}

fn write_frame(path: &Path) {
    let n = 40;
    let x1: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.2 } else { -1.2 } + 0.02 * i as f64).collect();
    let x2: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 0.8 } else { -0.8 }).collect();
    let labels: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();
    Frame::new()
        .with_column("x1", Column::scalar(x1))
        .unwrap()
        .with_column("x2", Column::scalar(x2))
        .unwrap()
        .with_column("Label", Column::scalar(labels))
        .unwrap()
        .to_json_file(path)
        .unwrap();
}

fn features() -> Vec<String> {
    vec!["x1".to_string(), "x2".to_string()]
}

#[test]
fn test_keygen_train_materialize_predict() {
    let dir = tempfile::tempdir().unwrap();
    let keys = dir.path().join("keys.json");
    let eval = dir.path().join("eval.json");
    let data = dir.path().join("data.json");
    let encrypted_model = dir.path().join("model.enc.json");
    let trained_model = dir.path().join("model.train.json");
    let model = dir.path().join("model.json");
    let scored = dir.path().join("scored.json");
    let args = encryption_args();
    write_frame(&data);

    cmd_keygen(&args, 7, &keys, Some(eval.as_path())).unwrap();
    assert!(KeySet::load(&keys).unwrap().has_secret_key());
    assert!(!KeySet::load(&eval).unwrap().has_secret_key());

    cmd_info(&data).unwrap();

    cmd_train(
        &data,
        &features(),
        "Label",
        None,
        &keys,
        &args,
        None,
        None,
        None,
        Some(10),
        &encrypted_model,
        Some(trained_model.as_path()),
    )
    .unwrap();
    let saved: EncryptedLinearModel<SimulatedCiphertext> = EncryptedLinearModel::load(&encrypted_model).unwrap();
    assert_eq!(saved.dimension(), 2);

    cmd_materialize(&encrypted_model, &keys, &args, &model).unwrap();
    let plain = LinearBinaryModel::load(&model).unwrap();
    assert_eq!(plain.n_features(), 2);
    assert_eq!(plain.coefficients, LinearBinaryModel::load(&trained_model).unwrap().coefficients);

    cmd_predict(&model, &data, &features(), "Label", Some(scored.as_path())).unwrap();
    let out = Frame::from_json_file(&scored).unwrap();
    let predicted = out.column("PredictedLabel").unwrap().scalar_values().unwrap();
    let labels = out.column("Label").unwrap().scalar_values().unwrap();
    let correct = predicted.iter().zip(&labels).filter(|(p, y)| p == y).count();
    assert!(correct as f64 / labels.len() as f64 >= 0.95);
    assert!(out.contains("Probability"));
}

#[test]
fn test_evaluation_keys_train_but_cannot_materialize() {
    let dir = tempfile::tempdir().unwrap();
    let keys = dir.path().join("keys.json");
    let eval = dir.path().join("eval.json");
    let data = dir.path().join("data.json");
    let encrypted_model = dir.path().join("model.enc.json");
    let skipped = dir.path().join("skipped.json");
    let model = dir.path().join("model.json");
    let args = encryption_args();
    write_frame(&data);

    cmd_keygen(&args, 11, &keys, Some(eval.as_path())).unwrap();
    cmd_train(
        &data,
        &features(),
        "Label",
        None,
        &eval,
        &args,
        None,
        Some(0.05),
        None,
        Some(3),
        &encrypted_model,
        Some(skipped.as_path()),
    )
    .unwrap();
    assert!(encrypted_model.exists());
    assert!(!skipped.exists());

    let err = cmd_materialize(&encrypted_model, &eval, &args, &model).unwrap_err();
    assert!(matches!(err.downcast_ref::<KolosalError>(), Some(KolosalError::KeyUnavailable(_))));

    // The full key set from the same generation decrypts it
    cmd_materialize(&encrypted_model, &keys, &args, &model).unwrap();
    assert!(model.exists());
}

#[test]
fn test_train_rejects_keys_for_other_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let keys = dir.path().join("keys.json");
    let data = dir.path().join("data.json");
    write_frame(&data);

    let small = EncryptionArgs {
        poly_modulus_degree: 4096,
        coeff_moduli: vec![40, 20, 40],
        scale_bits: 20,
    };
    cmd_keygen(&small, 1, &keys, None).unwrap();

    let result = cmd_train(
        &data,
        &features(),
        "Label",
        None,
        &keys,
        &encryption_args(),
        None,
        None,
        None,
        Some(1),
        &dir.path().join("model.enc.json"),
        None,
    );
    assert!(matches!(
        result.unwrap_err().downcast_ref::<KolosalError>(),
        Some(KolosalError::ConfigError(_))
    ));
}

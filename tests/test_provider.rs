//! Integration test: Encryption context, key files and provider arithmetic

use kolosal_encrypted::encryption::{
    decrypt_vector, encrypt_vector, CiphertextProvider, EncryptionContext, EncryptionParameters, FromKeyFile,
    KeyGenerator, KeySet, SimulatedCkksProvider,
};
use kolosal_encrypted::KolosalError;
use std::sync::Arc;

fn context() -> Arc<EncryptionContext> {
    EncryptionContext::new(EncryptionParameters::default()).unwrap()
}

fn close(a: &[f64], b: &[f64], tol: f64) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < tol)
}

#[test]
fn test_invalid_parameters_rejected() {
    let cases = vec![
        EncryptionParameters::new(1000, vec![60, 40, 60], 2f64.powi(40)),
        EncryptionParameters::new(8192, vec![60], 2f64.powi(40)),
        EncryptionParameters::new(8192, vec![60, 40, 40, 60], 0.0),
        EncryptionParameters::new(4096, vec![60, 60, 60, 60], 2f64.powi(40)),
    ];
    for params in cases {
        assert!(EncryptionContext::new(params.clone()).is_err(), "{:?} should be rejected", params);
    }
}

#[test]
fn test_vector_roundtrip_across_chunks() {
    let provider = SimulatedCkksProvider::generate(context(), 1).unwrap();
    let values: Vec<f64> = (0..5000).map(|i| (i as f64 * 0.37).sin()).collect();

    let bundle = encrypt_vector(&provider, &values).unwrap();
    assert_eq!(bundle.chunk_count(), 2);
    assert_eq!(bundle.len(), 5000);

    let out = decrypt_vector(&provider, &bundle).unwrap();
    assert!(close(&values, &out, 1e-6));
}

#[test]
fn test_add_and_multiply_are_homomorphic() {
    let p = SimulatedCkksProvider::generate(context(), 2).unwrap();
    let a = p.encrypt(&[1.5, -2.0, 0.25]).unwrap();
    let b = p.encrypt(&[0.5, 4.0, 1.0]).unwrap();

    let sum = p.decrypt(&p.add(&a, &b).unwrap()).unwrap();
    assert!(close(&sum, &[2.0, 2.0, 1.25], 1e-6));

    let prod = p.rescale(&p.multiply(&a, &b).unwrap()).unwrap();
    assert!(close(&p.decrypt(&prod).unwrap(), &[0.75, -8.0, 0.25], 1e-6));

    let scaled = p.rescale(&p.multiply_plain(&a, -2.0).unwrap()).unwrap();
    assert!(close(&p.decrypt(&scaled).unwrap(), &[-3.0, 4.0, -0.5], 1e-6));

    let total = p.sum_slots(&prod).unwrap();
    assert!((p.reveal_scalar(&total).unwrap() - (0.75 - 8.0 + 0.25)).abs() < 1e-6);
}

#[test]
fn test_noise_budget_never_increases() {
    let p = SimulatedCkksProvider::generate(context(), 3).unwrap();
    let x = p.encrypt(&[0.5, 1.5, -1.0]).unwrap();
    let w = p.encrypt(&[0.1, 0.2, 0.3]).unwrap();

    let fresh = p.noise_budget(&x);
    let sum = p.add(&x, &w).unwrap();
    assert!(p.noise_budget(&sum) <= fresh);

    let switched = p.mod_switch_to(&sum, 1).unwrap();
    assert!(p.noise_budget(&switched) <= p.noise_budget(&sum));

    let prod = p.rescale(&p.multiply(&x, &w).unwrap()).unwrap();
    assert!(p.noise_budget(&prod) <= fresh);

    let summed = p.sum_slots(&prod).unwrap();
    assert!(p.noise_budget(&summed) <= p.noise_budget(&prod));

    let scaled = p.rescale(&p.multiply_plain(&switched, 0.5).unwrap()).unwrap();
    assert!(p.noise_budget(&scaled) <= p.noise_budget(&switched));
}

#[test]
fn test_key_file_roundtrip_and_evaluation_keys() {
    let dir = tempfile::tempdir().unwrap();
    let full_path = dir.path().join("keys.json");
    let eval_path = dir.path().join("eval.json");

    let ctx = context();
    let keys = KeyGenerator::new(&ctx).generate(77);
    keys.save(&full_path).unwrap();
    keys.evaluation_only().save(&eval_path).unwrap();

    let loaded = KeySet::load(&full_path).unwrap();
    assert_eq!(loaded.key_id(), keys.key_id());
    assert!(loaded.has_secret_key());
    assert!(!KeySet::load(&eval_path).unwrap().has_secret_key());

    let params = EncryptionParameters::default();
    let owner = SimulatedCkksProvider::from_key_file(
        EncryptionContext::new(params.clone().with_key_file(&full_path)).unwrap(),
    )
    .unwrap();
    let evaluator =
        SimulatedCkksProvider::from_key_file(EncryptionContext::new(params.with_key_file(&eval_path)).unwrap())
            .unwrap();

    let ct = owner.encrypt(&[3.0]).unwrap();
    let doubled = evaluator.rescale(&evaluator.multiply_plain(&ct, 2.0).unwrap()).unwrap();
    assert!((evaluator.reveal_scalar(&doubled).unwrap() - 6.0).abs() < 1e-6);
    assert!(matches!(evaluator.decrypt(&doubled), Err(KolosalError::KeyUnavailable(_))));
    assert!((owner.decrypt(&doubled).unwrap()[0] - 6.0).abs() < 1e-6);
}

#[test]
fn test_keys_for_other_parameters_rejected() {
    let small = EncryptionContext::new(EncryptionParameters::new(4096, vec![40, 20, 40], 2f64.powi(20))).unwrap();
    let keys = KeyGenerator::new(&small).generate(1);
    assert!(SimulatedCkksProvider::new(context(), keys).is_err());
}

#[test]
fn test_missing_key_file_is_an_error() {
    let params = EncryptionParameters::default().with_key_file("/nonexistent/keys.json");
    let result = SimulatedCkksProvider::from_key_file(EncryptionContext::new(params).unwrap());
    assert!(result.is_err());

    let no_path = SimulatedCkksProvider::from_key_file(context());
    assert!(matches!(no_path, Err(KolosalError::ConfigError(_))));
}

#[test]
fn test_ciphertexts_from_other_keys_rejected() {
    let a = SimulatedCkksProvider::generate(context(), 10).unwrap();
    let b = SimulatedCkksProvider::generate(context(), 11).unwrap();
    let ct_a = a.encrypt(&[1.0]).unwrap();
    let ct_b = b.encrypt(&[1.0]).unwrap();
    assert!(matches!(
        a.add(&ct_a, &ct_b),
        Err(KolosalError::ProviderOperationFailure { .. })
    ));
}

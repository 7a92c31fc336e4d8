//! Integration test: Pipeline factory, preprocessing and catalog end-to-end

use kolosal_encrypted::autopipeline::{
    create_estimator, EstimatorName, PipelineNode, PipelineNodeType, SuggestedTransform, TransformEstimator,
    TransformPipeline, PROPERTY_MODE, PROPERTY_NUMBER_OF_BITS, PROPERTY_REPLACEMENT_MODE,
};
use kolosal_encrypted::catalog::{BinaryClassificationCatalog, TransformsCatalog};
use kolosal_encrypted::dataset::{Column, EncryptedFrame, Frame};
use kolosal_encrypted::encryption::{
    EncryptionContext, EncryptionParameters, KeyGenerator, SimulatedCiphertext, SimulatedCkksProvider,
};
use kolosal_encrypted::training::EncryptedSdcaOptions;
use kolosal_encrypted::KolosalError;
use std::sync::Arc;

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

fn raw_frame() -> Frame {
    Frame::new()
        .with_column("age", Column::scalar(vec![20.0, f64::NAN, 40.0, 60.0]))
        .unwrap()
        .with_column("income", Column::scalar(vec![1.0, 2.0, 3.0, 4.0]))
        .unwrap()
        .with_column(
            "city",
            Column::text(vec![Some("paris"), Some("berlin"), None, Some("paris")]),
        )
        .unwrap()
        .with_column("Label", Column::scalar(vec![0.0, 0.0, 1.0, 1.0]))
        .unwrap()
}

#[test]
fn test_factory_builds_every_estimator() {
    for name in EstimatorName::ALL {
        let node = match name {
            EstimatorName::ColumnConcatenating => {
                PipelineNode::transform(name, names(&["a", "b"]), names(&["out"]))
            }
            _ => PipelineNode::transform(name, names(&["a"]), names(&["out"])),
        };
        let estimator = create_estimator(&node);
        assert!(estimator.is_ok(), "{} should build: {:?}", name, estimator.err());
        assert_eq!(estimator.unwrap().name(), name);
    }
}

#[test]
fn test_factory_rejects_wrong_arity() {
    let node = PipelineNode::transform(EstimatorName::Normalizing, names(&["a", "b"]), names(&["out"]));
    match create_estimator(&node) {
        Err(KolosalError::ArityMismatch { estimator, inputs, outputs, .. }) => {
            assert_eq!(estimator, "Normalizing");
            assert_eq!((inputs, outputs), (2, 1));
        }
        other => panic!("expected ArityMismatch, got {:?}", other),
    }

    let node = PipelineNode::transform(EstimatorName::OneHotEncoding, names(&["a", "b"]), names(&["x"]));
    assert!(matches!(create_estimator(&node), Err(KolosalError::ArityMismatch { .. })));

    let node = PipelineNode::transform(EstimatorName::ColumnConcatenating, vec![], names(&["x"]));
    assert!(matches!(create_estimator(&node), Err(KolosalError::ArityMismatch { .. })));
}

#[test]
fn test_factory_rejects_unknown_and_trainer_nodes() {
    let node = PipelineNode::new("Tokenizing", PipelineNodeType::Transform, names(&["a"]), names(&["b"]));
    assert!(create_estimator(&node).is_err());

    let node = PipelineNode::new("Normalizing", PipelineNodeType::Trainer, names(&["a"]), names(&["b"]));
    assert!(matches!(create_estimator(&node), Err(KolosalError::InvalidInput(_))));
}

#[test]
fn test_factory_reads_properties() {
    let node = PipelineNode::transform(EstimatorName::Normalizing, names(&["a"]), names(&["a"]))
        .with_property(PROPERTY_MODE, "MeanVariance");
    assert!(create_estimator(&node).is_ok());

    let node = PipelineNode::transform(EstimatorName::Normalizing, names(&["a"]), names(&["a"]))
        .with_property(PROPERTY_MODE, "Log");
    assert!(matches!(create_estimator(&node), Err(KolosalError::InvalidParameter { .. })));

    let node = PipelineNode::transform(EstimatorName::OneHotHashEncoding, names(&["c"]), names(&["c"]))
        .with_property(PROPERTY_NUMBER_OF_BITS, 4);
    match create_estimator(&node).unwrap() {
        TransformEstimator::OneHotHashEncoding(enc) => assert_eq!(enc.width(), 16),
        other => panic!("unexpected estimator {:?}", other),
    }

    let node = PipelineNode::transform(EstimatorName::OneHotHashEncoding, names(&["c"]), names(&["c"]))
        .with_property(PROPERTY_NUMBER_OF_BITS, 64);
    assert!(create_estimator(&node).is_err());
}

#[test]
fn test_pipeline_from_nodes_fit_and_reuse() {
    let nodes = vec![
        PipelineNode::transform(EstimatorName::MissingValueReplacing, names(&["age"]), names(&["age"]))
            .with_property(PROPERTY_REPLACEMENT_MODE, "Mean"),
        PipelineNode::transform(EstimatorName::Normalizing, names(&["age"]), names(&["age"])),
        PipelineNode::transform(EstimatorName::OneHotEncoding, names(&["city"]), names(&["city_onehot"])),
        PipelineNode::transform(
            EstimatorName::ColumnConcatenating,
            names(&["age", "income", "city_onehot"]),
            names(&["Features"]),
        ),
    ];
    let mut pipeline = TransformPipeline::from_nodes(nodes).unwrap();
    assert_eq!(pipeline.len(), 4);

    let frame = raw_frame();
    let out = pipeline.fit_transform(&frame).unwrap();
    let features = out.column("Features").unwrap();
    assert_eq!(features.len(), 4);
    // age + income + one slot per city seen in training
    assert_eq!(features.width(), 4);

    let rows = features.numeric_rows().unwrap();
    assert!(rows.iter().flatten().all(|v| v.is_finite()));
    // MinMax: 20 maps to 0 and 60 to 1; the missing age becomes the mean 40
    assert!((rows[0][0] - 0.0).abs() < 1e-12);
    assert!((rows[1][0] - 0.5).abs() < 1e-12);
    assert!((rows[3][0] - 1.0).abs() < 1e-12);

    // The fitted pipeline applies unchanged to new data
    let again = pipeline.transform(&frame).unwrap();
    assert_eq!(again, out);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    pipeline.save(&path).unwrap();
    let loaded = TransformPipeline::load(&path).unwrap();
    assert_eq!(loaded.transform(&frame).unwrap(), out);
}

#[test]
fn test_text_featurizer_in_pipeline() {
    let frame = Frame::new()
        .with_column(
            "review",
            Column::text(vec![Some("great product"), Some("terrible product"), None]),
        )
        .unwrap();
    let mut pipeline = TransformPipeline::new()
        .with_transform(SuggestedTransform::text_featurizing("review", "review_vec").unwrap());
    let out = pipeline.fit_transform(&frame).unwrap();
    let rows = out.column("review_vec").unwrap().numeric_rows().unwrap();
    assert_eq!(rows[0].len(), 1024);

    let norm: f64 = rows[0].iter().map(|v| v * v).sum::<f64>().sqrt();
    assert!((norm - 1.0).abs() < 1e-9);
    assert!(rows[2].iter().all(|&v| v == 0.0));
    assert_ne!(rows[0], rows[1]);
}

#[test]
fn test_catalog_encrypt_train_materialize() {
    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("keys.json");

    let params = EncryptionParameters::default().with_key_file(&key_path);
    let ctx = EncryptionContext::new(params.clone()).unwrap();
    KeyGenerator::new(&ctx).generate(99).save(&key_path).unwrap();

    let n = 40;
    let x1: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.5 } else { -1.5 } + 0.01 * i as f64).collect();
    let x2: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
    let labels: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { 0.0 }).collect();
    let frame = Frame::new()
        .with_column("x1", Column::scalar(x1))
        .unwrap()
        .with_column("x2", Column::scalar(x2))
        .unwrap()
        .with_column("Label", Column::scalar(labels.clone()))
        .unwrap();

    let mut pipeline = TransformPipeline::new()
        .with_transform(SuggestedTransform::column_concatenating(&["x1", "x2"], "Features").unwrap());
    let frame = pipeline.fit_transform(&frame).unwrap();

    let seal = TransformsCatalog::encrypt_features(
        true,
        params.scale,
        params.poly_modulus_degree,
        &key_path,
        params.coeff_modulus_bits.clone(),
        "EncryptedFeatures",
        Some("Features"),
    )
    .fit::<SimulatedCkksProvider>()
    .unwrap();
    let encrypted = seal.encrypt(EncryptedFrame::from(frame.clone())).unwrap();
    assert_eq!(encrypted.encrypted_column_names(), vec!["EncryptedFeatures"]);

    let trainer = BinaryClassificationCatalog::encrypted_sdca_logistic_regression(
        params.poly_modulus_degree,
        params.coeff_modulus_bits.clone(),
        params.scale,
        "EncryptedFeatures",
        &key_path,
        "Label",
        "Features",
        None,
        None,
        None,
        Some(10),
    );
    let provider: &SimulatedCkksProvider = seal.provider();
    let model = trainer.fit_and_materialize(&encrypted, provider).unwrap();
    assert_eq!(model.n_features(), 2);

    let x = frame.feature_matrix("Features").unwrap();
    let y = ndarray::Array1::from(labels);
    assert!(model.score(&x, &y).unwrap() >= 0.95);
    let metadata = model.metadata.as_ref().unwrap();
    assert_eq!(metadata.trainer, "EncryptedSdcaLogisticRegression");
    assert_eq!(metadata.n_features, 2);
}

#[test]
fn test_catalog_rejects_mismatched_provider() {
    let ctx = EncryptionContext::new(EncryptionParameters::default()).unwrap();
    let provider = Arc::new(SimulatedCkksProvider::generate(ctx, 1).unwrap());
    let frame = Frame::new()
        .with_column("Features", Column::vector(vec![vec![1.0], vec![-1.0]]).unwrap())
        .unwrap()
        .with_column("Label", Column::scalar(vec![1.0, 0.0]))
        .unwrap();
    let encrypted = TransformsCatalog::encrypt_features(
        true,
        2f64.powi(40),
        8192,
        "unused.json",
        vec![60, 40, 40, 60],
        "EncryptedFeatures",
        Some("Features"),
    )
    .fit_with_provider(provider.clone())
    .unwrap()
    .encrypt(EncryptedFrame::from(frame))
    .unwrap();

    let other = EncryptionParameters::new(16384, vec![60, 40, 40, 40, 60], 2f64.powi(40));
    let trainer = BinaryClassificationCatalog::encrypted_sdca_logistic_regression_with_options(
        other,
        EncryptedSdcaOptions::default(),
    );
    assert!(matches!(
        trainer.fit(&encrypted, provider.as_ref()),
        Err(KolosalError::ConfigError(_))
    ));
}

#[test]
fn test_encrypt_features_rejects_provider_with_other_parameters() {
    let ctx = EncryptionContext::new(EncryptionParameters::default()).unwrap();
    let provider = Arc::new(SimulatedCkksProvider::generate(ctx, 2).unwrap());

    let estimator = TransformsCatalog::encrypt_features(
        true,
        2f64.powi(50),
        16384,
        "unused.json",
        vec![60, 50, 50, 60],
        "EncryptedFeatures",
        Some("Features"),
    );
    match estimator.fit_with_provider(provider) {
        Err(KolosalError::ConfigError(message)) => assert!(message.contains("N=8192")),
        Err(other) => panic!("expected ConfigError, got {:?}", other),
        Ok(_) => panic!("mismatched provider was accepted"),
    }
}

#[test]
fn test_seal_decrypt_requires_secret_key() {
    let params = EncryptionParameters::default();
    let ctx = EncryptionContext::new(params.clone()).unwrap();
    let keys = KeyGenerator::new(&ctx).generate(5);
    let owner = Arc::new(SimulatedCkksProvider::new(ctx.clone(), keys.clone()).unwrap());
    let evaluator = Arc::new(SimulatedCkksProvider::new(ctx, keys.evaluation_only()).unwrap());

    let frame = Frame::new()
        .with_column("Features", Column::vector(vec![vec![0.5, -0.25]]).unwrap())
        .unwrap();
    let encrypted: EncryptedFrame<SimulatedCiphertext> = TransformsCatalog::encrypt_features(
        true,
        params.scale,
        params.poly_modulus_degree,
        "unused.json",
        params.coeff_modulus_bits.clone(),
        "Features",
        None,
    )
    .fit_with_provider(owner.clone())
    .unwrap()
    .encrypt(EncryptedFrame::from(frame))
    .unwrap();

    let decrypt = TransformsCatalog::encrypt_features(
        false,
        params.scale,
        params.poly_modulus_degree,
        "unused.json",
        params.coeff_modulus_bits.clone(),
        "Decrypted",
        Some("Features"),
    );
    assert!(matches!(
        decrypt.fit_with_provider(evaluator).unwrap().decrypt(&encrypted),
        Err(KolosalError::KeyUnavailable(_))
    ));

    let plain = decrypt.fit_with_provider(owner).unwrap().decrypt(&encrypted).unwrap();
    let rows = plain.column("Decrypted").unwrap().numeric_rows().unwrap();
    assert!((rows[0][0] - 0.5).abs() < 1e-6);
    assert!((rows[0][1] + 0.25).abs() < 1e-6);
}

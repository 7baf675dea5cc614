use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;

use qfraud::config::{PipelineConfig, QuantumBackend};
use qfraud::error::{ConfigError, FraudCoreError, ModelError};
use qfraud::machine_learning::classifier::ClassifierMode;
use qfraud::machine_learning::dataset::TransactionDataset;
use qfraud::pipeline::FraudPipeline;

/// Amount, CountryRisk, TimeOfDay, SenderBlacklisted, SenderAgeDays
fn transactions() -> (Array2<f64>, Vec<u8>) {
    let x = array![
        [120.0, 0.10, 0.0, 0.0, 900.0],
        [80.0, 0.20, 0.0, 0.0, 1500.0],
        [45.0, 0.15, 1.0, 0.0, 700.0],
        [300.0, 0.30, 0.0, 0.0, 365.0],
        [60.0, 0.05, 0.0, 0.0, 2000.0],
        [150.0, 0.25, 1.0, 0.0, 1100.0],
        [95.0, 0.10, 0.0, 0.0, 820.0],
        [210.0, 0.20, 0.0, 0.0, 640.0],
        [9500.0, 0.90, 1.0, 1.0, 3.0],
        [7200.0, 0.80, 1.0, 1.0, 10.0],
        [8800.0, 0.95, 1.0, 0.0, 1.0],
        [6400.0, 0.85, 0.0, 1.0, 5.0]
    ];
    (x, vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1])
}

#[test]
fn test_full_analysis() {
    let (x, labels) = transactions();
    let pipeline = FraudPipeline::new(PipelineConfig::default()).unwrap();

    let report = pipeline.analyze(&x, &labels).unwrap();

    assert_eq!(report.quantum.predictions.len(), 12);
    assert_eq!(report.quantum.probabilities.dim(), (12, 2));
    assert_eq!(report.diagnostics.backend, QuantumBackend::Available);
    assert_eq!(report.diagnostics.mode, ClassifierMode::QuantumKernel);
    assert_eq!(report.diagnostics.fallback_count, 0);
    assert_eq!(report.diagnostics.components, 4);
    assert!(report.diagnostics.enhancement.label_aware);

    let metrics = &report.quantum.metrics;
    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert!((0.0..=1.0).contains(&metrics.f1));
    assert_eq!(metrics.confusion.total(), 12);

    let classical = report.classical.as_ref().unwrap();
    assert_eq!(classical.predictions, labels);
    assert_eq!(classical.metrics.auc, Some(1.0));
}

#[test]
fn test_analysis_is_reproducible() {
    let (x, labels) = transactions();
    let pipeline = FraudPipeline::new(PipelineConfig::default()).unwrap();

    let first = pipeline.analyze(&x, &labels).unwrap();
    let second = pipeline.analyze(&x, &labels).unwrap();
    let explicit = pipeline
        .analyze_with_rng(&x, &labels, &mut StdRng::seed_from_u64(42))
        .unwrap();

    assert_eq!(first.quantum.predictions, second.quantum.predictions);
    assert_eq!(first.quantum.probabilities, second.quantum.probabilities);
    assert_eq!(first.quantum.predictions, explicit.quantum.predictions);
}

#[test]
fn test_classical_only_environment() {
    let (x, labels) = transactions();
    let pipeline = FraudPipeline::new(PipelineConfig::classical_only()).unwrap();

    let report = pipeline.analyze(&x, &labels).unwrap();

    assert_eq!(report.diagnostics.mode, ClassifierMode::ClassicalFallback);
    assert_eq!(report.diagnostics.fallback_count, 12);
    assert_eq!(report.diagnostics.backend, QuantumBackend::Unavailable);
}

#[test]
fn test_baseline_can_be_disabled() {
    let (x, labels) = transactions();
    let config = PipelineConfig {
        classical_baseline: false,
        ..Default::default()
    };
    let report = FraudPipeline::new(config).unwrap().analyze(&x, &labels).unwrap();
    assert!(report.classical.is_none());
}

#[test]
fn test_degenerate_labels_skip_enhancement() {
    let (x, _) = transactions();
    let labels = vec![0; 12];
    let report = FraudPipeline::new(PipelineConfig::default())
        .unwrap()
        .analyze(&x, &labels)
        .unwrap();

    assert_eq!(report.quantum.predictions, labels);
    assert!(report.quantum.probabilities.column(1).iter().all(|&p| (p - 0.15).abs() < 1e-12));
    assert_eq!(report.diagnostics.enhancement.flips, 0);
    assert_eq!(report.quantum.metrics.fraud_detected, 0);
}

#[test]
fn test_malformed_input_is_an_error() {
    let pipeline = FraudPipeline::new(PipelineConfig::default()).unwrap();

    let err = pipeline.analyze(&array![[1.0], [2.0]], &[0]).unwrap_err();
    assert!(matches!(err, FraudCoreError::Model(ModelError::InvalidInput(_))));

    let err = pipeline.analyze(&array![[1.0], [f64::NAN]], &[0, 1]).unwrap_err();
    assert!(matches!(err, FraudCoreError::Model(_)));
}

#[test]
fn test_report_serializes() {
    let (x, labels) = transactions();
    let report = FraudPipeline::new(PipelineConfig::default())
        .unwrap()
        .analyze(&x, &labels)
        .unwrap();

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"label_aware\":true"));
    assert!(json.contains("quantum_kernel"));
}

#[test]
fn test_config_file_loading() {
    let path = std::env::temp_dir().join(format!("qfraud-{}-config.json", std::process::id()));
    fs::write(
        &path,
        r#"{ "qubit_count": 3, "seed": 9, "svm": { "c": 2.0 }, "enhancement": { "enabled": false } }"#,
    )
    .unwrap();

    let config = PipelineConfig::from_json_file(&path).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(config.qubit_count, 3);
    assert_eq!(config.seed, 9);
    assert_eq!(config.svm.c, 2.0);
    assert_eq!(config.svm.tolerance, 1e-3);
    assert!(!config.enhancement.enabled);
    assert!(config.classical_baseline);

    let err = PipelineConfig::from_json_str(r#"{ "svm": { "c": -1.0 } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidParameter { .. }));
}

#[test]
fn test_analyze_dataset_from_csv() {
    let path = std::env::temp_dir().join(format!("qfraud-{}-pipeline.csv", std::process::id()));
    let (x, labels) = transactions();

    let mut contents = String::from("TransactionID,Amount,CountryRisk,TimeOfDay,SenderBlacklisted,SenderAgeDays,Label\n");
    for (i, (row, label)) in x.outer_iter().zip(&labels).enumerate() {
        let time = if row[2] == 1.0 { "Night" } else { "Day" };
        contents.push_str(&format!(
            "T{},{},{},{},{},{},{}\n",
            i, row[0], row[1], time, row[3], row[4], label
        ));
    }
    fs::write(&path, contents).unwrap();

    let dataset = TransactionDataset::from_csv(&path).unwrap();
    fs::remove_file(&path).ok();
    assert_eq!(dataset.features(), &x);

    let pipeline = FraudPipeline::new(PipelineConfig::default()).unwrap();
    let from_file = pipeline.analyze_dataset(&dataset).unwrap();
    let direct = pipeline.analyze(&x, &labels).unwrap();
    assert_eq!(from_file.quantum.predictions, direct.quantum.predictions);
}

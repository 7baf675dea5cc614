use ndarray::{array, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f64::consts::PI;
use std::fs;
use std::path::PathBuf;

use qfraud::config::QuantumBackend;
use qfraud::error::DatasetError;
use qfraud::machine_learning::classifier::{ClassifierMode, HybridClassifier, TrainingData};
use qfraud::machine_learning::dataset::TransactionDataset;
use qfraud::machine_learning::enhancement::{
    EnhancementAction, EnhancementConfig, EnhancementHeuristic, EnhancementStatus, SkipReason,
};
use qfraud::machine_learning::preprocessing::{preprocess, FeatureNormalizer, Pca, PreprocessingConfig, StandardScaler};
use qfraud::machine_learning::svm::SvmConfig;
use qfraud::quantum::MAX_QUBITS;

/// Helper function for comparing f64 with tolerance
fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Two well separated clusters, genuine first
fn clustered_batch() -> (Array2<f64>, Vec<u8>) {
    let x = array![
        [0.10, 0.20],
        [0.20, 0.10],
        [0.15, 0.25],
        [0.25, 0.15],
        [0.05, 0.10],
        [0.90, 0.80],
        [0.80, 0.95],
        [0.95, 0.85],
        [0.85, 0.90]
    ];
    (x, vec![0, 0, 0, 0, 0, 1, 1, 1, 1])
}

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("qfraud-{}-{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path
}

#[cfg(test)]
mod normalizer_tests {
    use super::*;

    #[test]
    fn test_columns_map_to_angle_range() {
        let x = array![[2.0, -1.0, 7.0], [4.0, 3.0, 7.0], [3.0, 1.0, 7.0]];
        let normalized = FeatureNormalizer::default().normalize(&x);

        assert_eq!(normalized.column(0).to_vec(), vec![0.0, PI, PI / 2.0]);
        assert_eq!(normalized[[0, 1]], 0.0);
        assert_eq!(normalized[[1, 1]], PI);
        // Constant column maps to 0
        assert!(normalized.column(2).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_custom_upper_bound() {
        let normalized = FeatureNormalizer::with_upper_bound(1.0).normalize(&array![[0.0], [5.0], [10.0]]);
        assert_eq!(normalized.column(0).to_vec(), vec![0.0, 0.5, 1.0]);
    }
}

#[cfg(test)]
mod preprocessing_tests {
    use super::*;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let scaler = StandardScaler::fit(&x);
        let scaled = scaler.transform(&x);

        assert_eq!(scaler.mean().to_vec(), vec![2.0, 5.0]);
        assert_eq!(scaled.column(0).to_vec(), vec![-1.0, 1.0]);
        assert_eq!(scaled.column(1).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_pca_finds_dominant_direction() {
        let x = array![[-2.0, -2.1], [-1.0, -0.9], [0.0, 0.1], [1.0, 1.0], [2.0, 1.9]];
        let pca = Pca::fit(&x, 1);

        let component = pca.components().row(0).to_vec();
        assert!(approx_eq(component[0].abs(), component[1].abs(), 0.05));
        assert!(component[0] > 0.0 && component[1] > 0.0);
        assert_eq!(pca.transform(&x).ncols(), 1);
    }

    #[test]
    fn test_component_count_is_bounded_by_rows() {
        let x = array![[1.0, 2.0, 3.0, 4.0, 5.0], [2.0, 1.0, 0.0, 3.0, 9.0], [0.5, 0.5, 2.0, 1.0, 4.0]];
        let prepared = preprocess(&PreprocessingConfig::default(), &x);

        // min(4, k = 5, n - 1 = 2)
        assert_eq!(prepared.reduced.ncols(), 2);
        assert!(prepared.scaler.is_some());
        assert!(prepared.pca.is_some());
    }

    #[test]
    fn test_single_row_passes_through() {
        let x = array![[1.0, 2.0]];
        let prepared = preprocess(&PreprocessingConfig::default(), &x);
        assert_eq!(prepared.reduced, x);
        assert!(prepared.pca.is_none());
    }
}

#[cfg(test)]
mod dataset_tests {
    use super::*;

    #[test]
    fn test_load_transaction_csv() {
        let path = temp_file(
            "transactions.csv",
            "TransactionID,Amount,CountryRisk,TimeOfDay,SenderBlacklisted,SenderAgeDays,Label\n\
             T1,120.5,0.2,Day,0,400,0\n\
             T2,9800,0.9,Night,1,3,1\n\
             \n\
             T3,15,0.1,0,0,1200,0\n",
        );

        let dataset = TransactionDataset::from_csv(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.features().ncols(), 5);
        assert_eq!(dataset.labels(), &[0, 1, 0]);
        assert_eq!(dataset.fraud_count(), 1);

        let (row, label) = dataset.sample(1).unwrap();
        assert_eq!(row.to_vec(), vec![9800.0, 0.9, 1.0, 1.0, 3.0]);
        assert_eq!(label, 1);
    }

    #[test]
    fn test_column_order_is_free() {
        let path = temp_file(
            "reordered.csv",
            "Label,SenderAgeDays,Extra,SenderBlacklisted,TimeOfDay,CountryRisk,Amount,TransactionID\n\
             1,5,x,1,Night,0.8,700,T1\n",
        );

        let dataset = TransactionDataset::from_csv(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(dataset.features().row(0).to_vec(), vec![700.0, 0.8, 1.0, 1.0, 5.0]);
    }

    #[test]
    fn test_quoted_fields() {
        let path = temp_file(
            "quoted.csv",
            "TransactionID,Amount,CountryRisk,TimeOfDay,SenderBlacklisted,SenderAgeDays,Label\n\
             \"TX,001\",120.0,0.2,Day,0,400,0\n\
             T2,\"9800.5\",0.9,\"Night\",1,3,1\n",
        );

        let dataset = TransactionDataset::from_csv(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.features().row(0).to_vec(), vec![120.0, 0.2, 0.0, 0.0, 400.0]);
        assert_eq!(dataset.features().row(1).to_vec(), vec![9800.5, 0.9, 1.0, 1.0, 3.0]);
        assert_eq!(dataset.labels(), &[0, 1]);
    }

    #[test]
    fn test_missing_columns_are_named() {
        let path = temp_file("missing.csv", "TransactionID,Amount,Label\nT1,5,0\n");
        let err = TransactionDataset::from_csv(&path).unwrap_err();
        fs::remove_file(&path).ok();

        match err {
            DatasetError::MissingColumns(cols) => {
                assert!(cols.contains(&"CountryRisk".to_string()));
                assert!(!cols.contains(&"Amount".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unparseable_cell_reports_location() {
        let path = temp_file(
            "bad.csv",
            "TransactionID,Amount,CountryRisk,TimeOfDay,SenderBlacklisted,SenderAgeDays,Label\n\
             T1,abc,0.2,Day,0,400,0\n",
        );
        let err = TransactionDataset::from_csv(&path).unwrap_err();
        fs::remove_file(&path).ok();

        assert!(matches!(err, DatasetError::Parse { line: 2, ref column, .. } if column == "Amount"));
    }

    #[test]
    fn test_missing_file() {
        let err = TransactionDataset::from_csv("/nonexistent/qfraud.csv").unwrap_err();
        assert!(matches!(err, DatasetError::Io(_)));
    }
}

#[cfg(test)]
mod hybrid_classifier_tests {
    use super::*;

    #[test]
    fn test_all_zero_labels_give_constant_model() {
        let (x, _) = clustered_batch();
        let labels = vec![0; x.nrows()];
        let classifier = HybridClassifier::new(4, QuantumBackend::Available, SvmConfig::default());

        let outcome = classifier.classify(&x, &labels).unwrap();

        assert_eq!(outcome.mode, ClassifierMode::ConstantLabel { label: 0 });
        assert_eq!(outcome.predictions, labels);
        assert_eq!(outcome.model.classifier().name(), "constant");
        for row in outcome.probabilities.outer_iter() {
            assert!(approx_eq(row[1], 0.15, 1e-12));
        }
    }

    #[test]
    fn test_all_fraud_labels_give_constant_model() {
        let (x, _) = clustered_batch();
        let labels = vec![1; x.nrows()];
        let classifier = HybridClassifier::new(4, QuantumBackend::Unavailable, SvmConfig::default());

        let outcome = classifier.classify(&x, &labels).unwrap();
        assert_eq!(outcome.predictions, labels);
        assert!(approx_eq(outcome.probabilities[[0, 1]], 0.85, 1e-12));
    }

    #[test]
    fn test_quantum_kernel_path() {
        let (x, labels) = clustered_batch();
        let classifier = HybridClassifier::new(4, QuantumBackend::Available, SvmConfig::default());

        let outcome = classifier.classify(&x, &labels).unwrap();

        assert_eq!(outcome.mode, ClassifierMode::QuantumKernel);
        assert_eq!(outcome.fallback_count, 0);
        assert_eq!(outcome.predictions.len(), x.nrows());
        assert_eq!(outcome.quantum_features.dim(), (x.nrows(), 4));
        assert!(outcome.quantum_features.iter().all(|&z| (-1.0..=1.0).contains(&z)));

        for row in outcome.probabilities.outer_iter() {
            assert!(approx_eq(row.sum(), 1.0, 1e-12));
        }

        match outcome.model.training_data() {
            TrainingData::Kernel(k) => {
                assert_eq!(k.size(), x.nrows());
                assert!(k.is_symmetric());
            }
            TrainingData::Features(_) => panic!("expected a kernel"),
        }
    }

    #[test]
    fn test_unavailable_backend_uses_padded_features() {
        let (x, labels) = clustered_batch();
        let classifier = HybridClassifier::new(4, QuantumBackend::Unavailable, SvmConfig::default());

        let outcome = classifier.classify(&x, &labels).unwrap();

        assert_eq!(outcome.mode, ClassifierMode::ClassicalFallback);
        assert_eq!(outcome.fallback_count, x.nrows());

        let normalized = FeatureNormalizer::default().normalize(&x);
        assert_eq!(outcome.quantum_features.column(0), normalized.column(0));
        assert!(outcome.quantum_features.column(3).iter().all(|&v| v == 0.0));
        assert_eq!(outcome.model.classifier().name(), "svm-rbf");
    }

    #[test]
    fn test_failed_simulation_falls_back_to_features() {
        let (x, labels) = clustered_batch();
        let classifier = HybridClassifier::new(MAX_QUBITS + 1, QuantumBackend::Available, SvmConfig::default());

        let outcome = classifier.classify(&x, &labels).unwrap();

        assert_eq!(outcome.fallback_count, x.nrows());
        match &outcome.mode {
            ClassifierMode::ExpectationFeatures { reason } => {
                assert!(reason.contains("no simulated state"));
            }
            other => panic!("unexpected mode {}", other),
        }
    }

    #[test]
    fn test_rejects_non_binary_labels() {
        let (x, mut labels) = clustered_batch();
        labels[0] = 3;
        let classifier = HybridClassifier::new(4, QuantumBackend::Available, SvmConfig::default());
        assert!(classifier.classify(&x, &labels).is_err());
    }
}

#[cfg(test)]
mod enhancement_tests {
    use super::*;

    fn column(values: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap()
    }

    #[test]
    fn test_constant_magnitudes_make_no_flips() {
        let features = Array2::from_elem((6, 4), 0.5);
        let labels = vec![1, 0, 1, 0, 1, 0];
        let mut predictions = vec![0; 6];
        let mut probabilities = Array2::from_elem((6, 2), 0.5);
        let (before_pred, before_proba) = (predictions.clone(), probabilities.clone());
        let mut rng = StdRng::seed_from_u64(42);

        let report = EnhancementHeuristic::default()
            .apply(&features, &labels, &mut predictions, &mut probabilities, &mut rng)
            .unwrap();

        assert!(matches!(
            report.status,
            EnhancementStatus::Skipped { reason: SkipReason::LowSpread { .. } }
        ));
        assert_eq!(report.flip_count(), 0);
        assert_eq!(predictions, before_pred);
        assert_eq!(probabilities, before_proba);
    }

    #[test]
    fn test_missed_fraud_is_recovered() {
        // Magnitudes 0..=10: median 5, 75th percentile 7.5, maximum 10
        let features = column(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let mut labels = vec![0; 11];
        labels[8] = 1;
        // Only sample 8 is predicted genuine, so no coin is flipped
        let mut predictions = vec![1; 11];
        predictions[8] = 0;
        let mut probabilities = Array2::from_elem((11, 2), 0.5);
        let mut rng = StdRng::seed_from_u64(7);

        let report = EnhancementHeuristic::default()
            .apply(&features, &labels, &mut predictions, &mut probabilities, &mut rng)
            .unwrap();

        assert_eq!(report.flip_count(), 1);
        assert_eq!(predictions[8], 1);

        let confidence = probabilities[[8, 1]];
        assert!(confidence > 0.6 && confidence < 0.9);
        assert!(approx_eq(confidence, 0.6 + 3.0 / 5.0 * 0.3, 1e-12));
        assert!(approx_eq(probabilities[[8, 0]], 1.0 - confidence, 1e-12));
        assert!(matches!(
            report.decisions[0].action,
            EnhancementAction::FraudRecovered { .. }
        ));
    }

    #[test]
    fn test_fraud_at_maximum_is_capped() {
        let features = column(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let labels = vec![0, 0, 0, 0, 1];
        let mut predictions = vec![1, 1, 1, 1, 0];
        let mut probabilities = Array2::from_elem((5, 2), 0.5);
        let mut rng = StdRng::seed_from_u64(0);

        EnhancementHeuristic::default()
            .apply(&features, &labels, &mut predictions, &mut probabilities, &mut rng)
            .unwrap();

        assert!(approx_eq(probabilities[[4, 1]], 0.9, 1e-12));
    }

    #[test]
    fn test_low_magnitude_fraud_is_untouched() {
        let features = column(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let labels = vec![1, 0, 0, 0, 0];
        let predictions = vec![0, 1, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);

        let report = EnhancementHeuristic::default()
            .evaluate(&features, &labels, &predictions, &mut rng)
            .unwrap();

        assert!(report.is_applied());
        assert_eq!(report.flip_count(), 0);
    }

    #[test]
    fn test_edge_flips_are_reproducible() {
        let values: Vec<f64> = (0..40).map(|i| i as f64 * 0.1).collect();
        let features = column(&values);
        let labels = vec![0; 40];
        let predictions = vec![0; 40];
        let heuristic = EnhancementHeuristic::default();

        let first = heuristic
            .evaluate(&features, &labels, &predictions, &mut StdRng::seed_from_u64(11))
            .unwrap();
        let second = heuristic
            .evaluate(&features, &labels, &predictions, &mut StdRng::seed_from_u64(11))
            .unwrap();

        assert_eq!(first, second);
        for decision in &first.decisions {
            // Only samples above the 90th percentile are candidates
            assert!(decision.index > 35);
            assert_eq!(decision.probabilities, [0.4, 0.6]);
        }
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let heuristic = EnhancementHeuristic::new(EnhancementConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        assert!(heuristic
            .evaluate(&column(&[1.0, 2.0]), &[0], &[0, 0], &mut rng)
            .is_err());
    }
}

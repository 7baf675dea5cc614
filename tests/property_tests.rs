use ndarray::{Array1, Array2};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::f64::consts::PI;

use qfraud::config::QuantumBackend;
use qfraud::machine_learning::classifier::{ClassifierMode, HybridClassifier};
use qfraud::machine_learning::enhancement::EnhancementHeuristic;
use qfraud::machine_learning::preprocessing::FeatureNormalizer;
use qfraud::machine_learning::quantum::{feature_map_circuit, FidelityKernel, QuantumFeatureEncoder};
use qfraud::machine_learning::svm::SvmConfig;
use qfraud::simulators::{simulate, StatevectorSimulator};

fn angle_vector() -> impl Strategy<Value = Array1<f64>> {
    prop::collection::vec(0.0..=PI, 4).prop_map(Array1::from)
}

fn feature_matrix(max_rows: usize, cols: usize) -> impl Strategy<Value = Array2<f64>> {
    (1..=max_rows).prop_flat_map(move |rows| {
        prop::collection::vec(-1.0e6..1.0e6f64, rows * cols)
            .prop_map(move |values| Array2::from_shape_vec((rows, cols), values).unwrap())
    })
}

proptest! {
    #[test]
    fn prop_simulated_state_is_normalized(v in angle_vector()) {
        let state = simulate(&feature_map_circuit(&v).unwrap()).unwrap();
        prop_assert!((state.norm_sqr() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn prop_expectations_are_bounded(v in prop::collection::vec(-10.0..10.0f64, 1..=6)) {
        let v = Array1::from(v);
        let state = simulate(&feature_map_circuit(&v).unwrap()).unwrap();
        let expectations = StatevectorSimulator::from_state(state).expectation_z_all().unwrap();

        prop_assert_eq!(expectations.len(), v.len());
        for z in expectations.iter() {
            prop_assert!((-1.0..=1.0).contains(z));
        }
    }

    #[test]
    fn prop_kernel_is_symmetric_with_unit_diagonal(x in feature_matrix(6, 3)) {
        let batch = QuantumFeatureEncoder::new(4, QuantumBackend::Available).encode(&x);
        let states = batch.states().unwrap();
        let kernel = FidelityKernel.compute_kernel_matrix(&states).unwrap();

        prop_assert!(kernel.is_symmetric());
        for i in 0..kernel.size() {
            prop_assert!((kernel.get(i, i) - 1.0).abs() < 1e-9);
            for j in 0..kernel.size() {
                prop_assert!((0.0..=1.0).contains(&kernel.get(i, j)));
            }
        }
    }

    #[test]
    fn prop_normalizer_hits_bounds(x in feature_matrix(8, 3)) {
        let normalized = FeatureNormalizer::default().normalize(&x);

        for (raw, col) in x.columns().into_iter().zip(normalized.columns()) {
            let min = col.fold(f64::INFINITY, |a, &b| a.min(b));
            let max = col.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            let constant = raw.iter().all(|&v| v == raw[0]);

            prop_assert_eq!(min, 0.0);
            if constant {
                prop_assert_eq!(max, 0.0);
            } else {
                prop_assert_eq!(max, PI);
            }
        }
    }

    #[test]
    fn prop_single_label_is_returned_for_every_sample(
        x in feature_matrix(6, 2),
        label in 0u8..=1,
        available in any::<bool>(),
    ) {
        let backend = if available { QuantumBackend::Available } else { QuantumBackend::Unavailable };
        let labels = vec![label; x.nrows()];

        let outcome = HybridClassifier::new(4, backend, SvmConfig::default())
            .classify(&x, &labels)
            .unwrap();

        prop_assert_eq!(outcome.mode, ClassifierMode::ConstantLabel { label });
        prop_assert_eq!(outcome.predictions, labels);
    }

    #[test]
    fn prop_flat_magnitudes_leave_predictions_unchanged(
        value in -1.0..1.0f64,
        rows in 3usize..20,
        seed in any::<u64>(),
    ) {
        let features = Array2::from_elem((rows, 4), value);
        let labels: Vec<u8> = (0..rows).map(|i| (i % 2) as u8).collect();
        let mut predictions = vec![0; rows];
        let mut probabilities = Array2::from_elem((rows, 2), 0.5);
        let mut rng = StdRng::seed_from_u64(seed);

        let report = EnhancementHeuristic::default()
            .apply(&features, &labels, &mut predictions, &mut probabilities, &mut rng)
            .unwrap();

        prop_assert_eq!(report.flip_count(), 0);
        prop_assert_eq!(predictions, vec![0; rows]);
    }
}

//! Hybrid quantum/classical classifier
//!
//! Chooses among four tiers, first match wins:
//!
//! 1. single-class labels: a [`ConstantClassifier`], no SVM is fitted
//! 2. backend unavailable: RBF SVM on padded classical vectors
//! 3. fidelity kernel over simulated states, precomputed-kernel SVM
//! 4. if tier 3 fails: RBF SVM on Z-expectation features
//!
//! Scoring is transductive: the fitted model is evaluated on the batch it
//! was trained on.

use std::fmt;
use ndarray::Array2;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{PipelineConfig, QuantumBackend};
use crate::error::ModelError;
use crate::machine_learning::core::{single_class, ConstantClassifier, ProbabilisticClassifier};
use crate::machine_learning::dataset::validate_labels;
use crate::machine_learning::quantum::{EncodedBatch, FidelityKernel, KernelMatrix, QuantumFeatureEncoder};
use crate::machine_learning::svm::{SupportVectorClassifier, SvmConfig};

/// Which tier produced the predictions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierMode {
    /// Training labels held one class
    ConstantLabel { label: u8 },
    /// Precomputed fidelity kernel
    QuantumKernel,
    /// Kernel path failed; RBF on expectation features
    ExpectationFeatures { reason: String },
    /// Backend unavailable; RBF on padded classical vectors
    ClassicalFallback,
}

impl ClassifierMode {
    /// Whether predictions came from the fidelity kernel
    pub fn is_quantum_kernel(&self) -> bool {
        matches!(self, ClassifierMode::QuantumKernel)
    }
}

impl fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierMode::ConstantLabel { label } => write!(f, "constant label {}", label),
            ClassifierMode::QuantumKernel => write!(f, "quantum fidelity kernel"),
            ClassifierMode::ExpectationFeatures { reason } => {
                write!(f, "expectation features ({})", reason)
            }
            ClassifierMode::ClassicalFallback => write!(f, "classical fallback"),
        }
    }
}

/// Data a model was fitted on
#[derive(Debug, Clone)]
pub enum TrainingData {
    Kernel(KernelMatrix),
    Features(Array2<f64>),
}

impl TrainingData {
    /// Matrix handed to the classifier when scoring the training batch
    pub fn scoring_input(&self) -> &Array2<f64> {
        match self {
            TrainingData::Kernel(k) => k.as_array(),
            TrainingData::Features(x) => x,
        }
    }
}

/// A fitted classifier together with its training data
#[derive(Debug)]
pub struct TrainedModel {
    classifier: Box<dyn ProbabilisticClassifier>,
    data: TrainingData,
}

impl TrainedModel {
    pub fn new(classifier: Box<dyn ProbabilisticClassifier>, data: TrainingData) -> Self {
        Self { classifier, data }
    }

    pub fn classifier(&self) -> &dyn ProbabilisticClassifier {
        self.classifier.as_ref()
    }

    pub fn training_data(&self) -> &TrainingData {
        &self.data
    }

    /// Labels and probabilities for the training batch
    pub fn score_training_set(&self) -> Result<(Vec<u8>, Array2<f64>), ModelError> {
        let x = self.data.scoring_input();
        Ok((self.classifier.predict(x)?, self.classifier.predict_proba(x)?))
    }
}

/// Output of [`HybridClassifier::classify`]
#[derive(Debug)]
pub struct ClassificationOutcome {
    pub predictions: Vec<u8>,
    /// `n × 2`, column 1 is the fraud probability
    pub probabilities: Array2<f64>,
    pub mode: ClassifierMode,
    /// Per-sample quantum features (or their padded fallbacks)
    pub quantum_features: Array2<f64>,
    pub fallback_count: usize,
    pub model: TrainedModel,
}

/// SVM classifier over quantum-encoded samples with layered fallbacks
#[derive(Debug, Clone)]
pub struct HybridClassifier {
    encoder: QuantumFeatureEncoder,
    svm: SvmConfig,
}

impl HybridClassifier {
    pub fn new(qubit_count: usize, backend: QuantumBackend, svm: SvmConfig) -> Self {
        Self {
            encoder: QuantumFeatureEncoder::new(qubit_count, backend),
            svm,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.qubit_count, config.backend, config.svm.clone())
    }

    pub fn encoder(&self) -> &QuantumFeatureEncoder {
        &self.encoder
    }

    /// Encode, fit and score one labelled batch
    ///
    /// Degraded modes are reported in [`ClassificationOutcome::mode`]; an
    /// error means the input itself was malformed.
    pub fn classify(&self, x: &Array2<f64>, labels: &[u8]) -> Result<ClassificationOutcome, ModelError> {
        validate_batch(x, labels)?;

        let batch = self.encoder.encode(x);
        let fallback_count = batch.fallback_count;
        let quantum_features = batch.features.clone();

        let (mode, model) = if let Some(label) = single_class(labels) {
            info!(label, "Single class in training labels, using constant model");
            let model = TrainedModel::new(
                Box::new(ConstantClassifier::new(label, ConstantClassifier::QUANTUM_CONFIDENCE)),
                TrainingData::Features(batch.features.clone()),
            );
            (ClassifierMode::ConstantLabel { label }, model)
        } else if !self.encoder.backend().is_available() {
            info!("Training RBF classifier on classical fallback features");
            (ClassifierMode::ClassicalFallback, self.fit_rbf(&batch.features, labels)?)
        } else {
            match self.fit_kernel(&batch, labels) {
                Ok(model) => {
                    info!("Trained precomputed-kernel classifier on fidelity kernel");
                    (ClassifierMode::QuantumKernel, model)
                }
                Err(reason) => {
                    warn!(%reason, "Quantum kernel failed, falling back to expectation features");
                    let model = self.fit_rbf(&batch.features, labels)?;
                    (ClassifierMode::ExpectationFeatures { reason }, model)
                }
            }
        };

        let (predictions, probabilities) = model.score_training_set()?;

        Ok(ClassificationOutcome {
            predictions,
            probabilities,
            mode,
            quantum_features,
            fallback_count,
            model,
        })
    }

    fn fit_kernel(&self, batch: &EncodedBatch, labels: &[u8]) -> Result<TrainedModel, String> {
        let states = batch
            .states()
            .map_err(|idx| format!("sample {} has no simulated state", idx))?;

        let kernel = FidelityKernel
            .compute_kernel_matrix(&states)
            .map_err(|e| e.to_string())?;

        let mut svm = SupportVectorClassifier::precomputed(self.svm.clone());
        svm.fit(kernel.as_array(), labels).map_err(|e| e.to_string())?;

        Ok(TrainedModel::new(Box::new(svm), TrainingData::Kernel(kernel)))
    }

    fn fit_rbf(&self, features: &Array2<f64>, labels: &[u8]) -> Result<TrainedModel, ModelError> {
        let mut svm = SupportVectorClassifier::rbf(self.svm.clone());
        svm.fit(features, labels)?;
        Ok(TrainedModel::new(Box::new(svm), TrainingData::Features(features.clone())))
    }
}

/// Classical RBF classifier fitted directly on preprocessed features
#[derive(Debug, Clone, Default)]
pub struct ClassicalBaseline {
    svm: SvmConfig,
}

impl ClassicalBaseline {
    pub fn new(svm: SvmConfig) -> Self {
        Self { svm }
    }

    /// Fit and score one labelled batch
    ///
    /// A single-class batch yields a constant model with a 0.9/0.1 split.
    pub fn fit_predict(&self, x: &Array2<f64>, labels: &[u8]) -> Result<(TrainedModel, Vec<u8>, Array2<f64>), ModelError> {
        validate_batch(x, labels)?;

        let classifier: Box<dyn ProbabilisticClassifier> = match single_class(labels) {
            Some(label) => Box::new(ConstantClassifier::new(label, ConstantClassifier::CLASSICAL_CONFIDENCE)),
            None => {
                let mut svm = SupportVectorClassifier::rbf(self.svm.clone());
                svm.fit(x, labels)?;
                Box::new(svm)
            }
        };

        let model = TrainedModel::new(classifier, TrainingData::Features(x.clone()));
        let (predictions, probabilities) = model.score_training_set()?;
        Ok((model, predictions, probabilities))
    }
}

fn validate_batch(x: &Array2<f64>, labels: &[u8]) -> Result<(), ModelError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ModelError::invalid_input("feature matrix must be non-empty"));
    }
    if x.nrows() != labels.len() {
        return Err(ModelError::invalid_input(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            labels.len()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::invalid_input("feature matrix contains non-finite values"));
    }
    validate_labels(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mismatched_labels_rejected() {
        let classifier = HybridClassifier::new(4, QuantumBackend::Available, SvmConfig::default());
        assert!(classifier.classify(&array![[1.0], [2.0]], &[0]).is_err());
    }

    #[test]
    fn test_classical_baseline_constant_split() {
        let baseline = ClassicalBaseline::default();
        let (_, predictions, proba) = baseline.fit_predict(&array![[1.0], [2.0]], &[1, 1]).unwrap();

        assert_eq!(predictions, vec![1, 1]);
        assert!((proba[[0, 1]] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_mode_display() {
        let mode = ClassifierMode::ExpectationFeatures { reason: "boom".to_string() };
        assert!(mode.to_string().contains("boom"));
        assert!(ClassifierMode::QuantumKernel.is_quantum_kernel());
    }
}

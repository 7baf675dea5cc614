//! Core traits and types for classification models

use std::fmt::Debug;
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use crate::error::ModelError;

/// Base trait for fitted binary classifiers
///
/// Label 1 is fraud. Probability matrices are `n × 2` with rows summing to
/// one; column 1 holds the fraud probability.
pub trait ProbabilisticClassifier: Debug + Send + Sync {
    /// Signed score per row, positive meaning fraud
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;

    /// Two-class probabilities per row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError>;

    /// Predicted labels, the sign of the decision function
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .decision_function(x)?
            .iter()
            .map(|&d| u8::from(d > 0.0))
            .collect())
    }

    /// Short identifier for diagnostics
    fn name(&self) -> &'static str;
}

/// Model returned when the training labels hold a single class
///
/// Predicts the observed label for every row with a fixed confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConstantClassifier {
    label: u8,
    confidence: f64,
}

impl ConstantClassifier {
    /// Confidence used on the quantum path
    pub const QUANTUM_CONFIDENCE: f64 = 0.85;
    /// Confidence used by the classical baseline
    pub const CLASSICAL_CONFIDENCE: f64 = 0.9;

    pub fn new(label: u8, confidence: f64) -> Self {
        Self {
            label: label.min(1),
            confidence: confidence.clamp(0.5, 1.0),
        }
    }

    pub fn label(&self) -> u8 {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }
}

impl ProbabilisticClassifier for ConstantClassifier {
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let score = if self.label == 1 { 1.0 } else { -1.0 };
        Ok(Array1::from_elem(x.nrows(), score))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        let fraud = if self.label == 1 {
            self.confidence
        } else {
            1.0 - self.confidence
        };

        let mut proba = Array2::zeros((x.nrows(), 2));
        for mut row in proba.axis_iter_mut(Axis(0)) {
            row[0] = 1.0 - fraud;
            row[1] = fraud;
        }
        Ok(proba)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>, ModelError> {
        Ok(vec![self.label; x.nrows()])
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

/// The single label shared by every entry, if there is exactly one class
pub fn single_class(labels: &[u8]) -> Option<u8> {
    let first = *labels.first()?;
    labels.iter().all(|&l| l == first).then_some(first)
}

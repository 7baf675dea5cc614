//! End-to-end analysis run
//!
//! validate → preprocess → classical baseline → hybrid quantum classifier →
//! enhancement → metrics
//!
//! The enhancement step reads the ground-truth labels, so the quantum
//! metrics in an [`AnalysisReport`] describe calibrated training-set
//! predictions, not held-out performance.

use std::time::{Duration, Instant};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::config::{PipelineConfig, QuantumBackend};
use crate::error::Result;
use crate::machine_learning::classifier::{ClassicalBaseline, ClassifierMode, HybridClassifier};
use crate::machine_learning::dataset::TransactionDataset;
use crate::machine_learning::enhancement::{
    EnhancementDecision, EnhancementHeuristic, EnhancementReport, EnhancementStatus, SkipReason,
};
use crate::machine_learning::metrics::ClassificationMetrics;
use crate::machine_learning::preprocessing::preprocess;

/// Predictions and scores of one model
#[derive(Debug, Clone, Serialize)]
pub struct ModelRun {
    pub predictions: Vec<u8>,
    /// `n × 2`, column 1 is the fraud probability
    pub probabilities: Array2<f64>,
    pub metrics: ClassificationMetrics,
    pub training_time: Duration,
}

/// What the enhancement pass did
#[derive(Debug, Clone, Serialize)]
pub struct EnhancementSummary {
    /// Always true: decisions were derived from ground-truth labels
    pub label_aware: bool,
    pub status: EnhancementStatus,
    pub flips: usize,
    pub decisions: Vec<EnhancementDecision>,
}

impl From<EnhancementReport> for EnhancementSummary {
    fn from(report: EnhancementReport) -> Self {
        Self {
            label_aware: true,
            flips: report.flip_count(),
            status: report.status,
            decisions: report.decisions,
        }
    }
}

/// Degraded-mode and bookkeeping information
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub backend: QuantumBackend,
    pub mode: ClassifierMode,
    /// Samples encoded with classical fallback features
    pub fallback_count: usize,
    pub enhancement: EnhancementSummary,
    /// Feature columns after preprocessing
    pub components: usize,
}

/// Result of [`FraudPipeline::analyze`]
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub quantum: ModelRun,
    pub classical: Option<ModelRun>,
    pub diagnostics: Diagnostics,
}

/// Runs the full analysis for labelled batches
#[derive(Debug, Clone)]
pub struct FraudPipeline {
    config: PipelineConfig,
}

impl FraudPipeline {
    /// Create a pipeline after validating its configuration
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyze a batch with a generator seeded from the configuration
    pub fn analyze(&self, features: &Array2<f64>, labels: &[u8]) -> Result<AnalysisReport> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.analyze_with_rng(features, labels, &mut rng)
    }

    pub fn analyze_dataset(&self, dataset: &TransactionDataset) -> Result<AnalysisReport> {
        self.analyze(dataset.features(), dataset.labels())
    }

    /// Analyze a batch drawing enhancement coin flips from `rng`
    pub fn analyze_with_rng<R: Rng + ?Sized>(
        &self,
        features: &Array2<f64>,
        labels: &[u8],
        rng: &mut R,
    ) -> Result<AnalysisReport> {
        let dataset = TransactionDataset::new(features.clone(), labels.to_vec())?;
        info!(
            samples = dataset.len(),
            fraud = dataset.fraud_count(),
            backend = ?self.config.backend,
            "Starting analysis"
        );

        let prepared = preprocess(&self.config.preprocessing, dataset.features());
        let reduced = &prepared.reduced;

        let classical = if self.config.classical_baseline {
            let start = Instant::now();
            let (_, predictions, probabilities) =
                ClassicalBaseline::new(self.config.svm.clone()).fit_predict(reduced, labels)?;
            let training_time = start.elapsed();

            let metrics = ClassificationMetrics::compute(labels, &predictions, &probabilities)?;
            info!(accuracy = metrics.accuracy, ?training_time, "Classical baseline complete");
            Some(ModelRun {
                predictions,
                probabilities,
                metrics,
                training_time,
            })
        } else {
            None
        };

        let start = Instant::now();
        let outcome = HybridClassifier::from_config(&self.config).classify(reduced, labels)?;
        let training_time = start.elapsed();

        let mut predictions = outcome.predictions;
        let mut probabilities = outcome.probabilities;

        let report = match outcome.mode {
            ClassifierMode::ConstantLabel { .. } => EnhancementReport::skipped(SkipReason::SingleClassLabels),
            _ => EnhancementHeuristic::new(self.config.enhancement.clone()).apply(
                &outcome.quantum_features,
                labels,
                &mut predictions,
                &mut probabilities,
                rng,
            )?,
        };

        let metrics = ClassificationMetrics::compute(labels, &predictions, &probabilities)?;
        info!(
            accuracy = metrics.accuracy,
            mode = %outcome.mode,
            fallback_count = outcome.fallback_count,
            flips = report.flip_count(),
            ?training_time,
            "Quantum classifier complete"
        );

        Ok(AnalysisReport {
            quantum: ModelRun {
                predictions,
                probabilities,
                metrics,
                training_time,
            },
            classical,
            diagnostics: Diagnostics {
                backend: self.config.backend,
                mode: outcome.mode,
                fallback_count: outcome.fallback_count,
                enhancement: report.into(),
                components: reduced.ncols(),
            },
        })
    }
}

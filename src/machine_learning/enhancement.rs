//! Label-aware post-processing of quantum predictions
//!
//! Uses the magnitude `mᵢ = Σ|qᵢⱼ|` of each sample's quantum features as a
//! proxy signal. Missed frauds above the upper-quartile magnitude are
//! flipped to fraud deterministically; genuine samples above the 90th
//! percentile are flipped by a weighted coin drawn from the caller's random
//! source.
//!
//! The ground-truth labels drive every decision, so this is a calibration
//! step over labelled data. Metrics computed after it are optimistic.

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConfigError, ModelError};

/// Thresholds and interpolation ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    pub enabled: bool,
    /// Skip when the magnitude standard deviation is below this
    pub min_std: f64,
    /// Skip when fewer distinct magnitudes exist
    pub min_distinct: usize,
    /// Percentile a missed fraud must exceed to be recovered
    pub fraud_percentile: f64,
    /// Percentile a genuine sample must exceed to be considered
    pub edge_percentile: f64,
    /// Confidence range for recovered frauds, median to maximum magnitude
    pub fraud_confidence: (f64, f64),
    /// Flip chance range for genuine samples, edge percentile to maximum
    pub edge_chance: (f64, f64),
    /// Fraud probability assigned to flipped genuine samples
    pub edge_probability: f64,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_std: 0.001,
            min_distinct: 3,
            fraud_percentile: 75.0,
            edge_percentile: 90.0,
            fraud_confidence: (0.6, 0.9),
            edge_chance: (0.3, 0.7),
            edge_probability: 0.6,
        }
    }
}

impl EnhancementConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_std >= 0.0 && self.min_std.is_finite()) {
            return Err(ConfigError::invalid_parameter("enhancement.min_std", "must be non-negative"));
        }
        if self.min_distinct == 0 {
            return Err(ConfigError::invalid_parameter("enhancement.min_distinct", "must be at least 1"));
        }
        for (name, p) in [
            ("enhancement.fraud_percentile", self.fraud_percentile),
            ("enhancement.edge_percentile", self.edge_percentile),
        ] {
            if !(0.0..=100.0).contains(&p) {
                return Err(ConfigError::invalid_parameter(name, "must be within [0, 100]"));
            }
        }
        // Recovered confidence interpolates from the median upwards
        if self.fraud_percentile < 50.0 {
            return Err(ConfigError::invalid_parameter(
                "enhancement.fraud_percentile",
                "must be at least 50",
            ));
        }
        for (name, (lo, hi)) in [
            ("enhancement.fraud_confidence", self.fraud_confidence),
            ("enhancement.edge_chance", self.edge_chance),
        ] {
            if !(0.0 <= lo && lo <= hi && hi <= 1.0) {
                return Err(ConfigError::invalid_parameter(name, "must satisfy 0 <= low <= high <= 1"));
            }
        }
        if !(0.0..=1.0).contains(&self.edge_probability) {
            return Err(ConfigError::invalid_parameter("enhancement.edge_probability", "must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Batch statistics of the feature magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MagnitudeStats {
    pub std: f64,
    pub distinct: usize,
    pub median: f64,
    pub fraud_threshold: f64,
    pub edge_threshold: f64,
    pub max: f64,
}

/// Why the heuristic made no changes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    /// Training labels held one class
    SingleClassLabels,
    LowSpread { std: f64 },
    TooFewDistinct { distinct: usize },
}

/// What a single override did
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnhancementAction {
    /// Missed fraud recovered with interpolated confidence
    FraudRecovered { confidence: f64 },
    /// Genuine sample flagged after a successful coin flip
    EdgeFlagged { chance: f64 },
}

/// Per-sample override of label and probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnhancementDecision {
    pub index: usize,
    pub magnitude: f64,
    pub action: EnhancementAction,
    pub label: u8,
    /// `[genuine, fraud]`
    pub probabilities: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnhancementStatus {
    Applied { stats: MagnitudeStats },
    Skipped { reason: SkipReason },
}

/// Outcome of one enhancement pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancementReport {
    pub status: EnhancementStatus,
    pub decisions: Vec<EnhancementDecision>,
}

impl EnhancementReport {
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            status: EnhancementStatus::Skipped { reason },
            decisions: Vec::new(),
        }
    }

    pub fn flip_count(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.status, EnhancementStatus::Applied { .. })
    }

    /// Write the overrides into prediction and probability buffers
    pub fn apply_to(&self, predictions: &mut [u8], probabilities: &mut Array2<f64>) {
        for decision in &self.decisions {
            predictions[decision.index] = decision.label;
            probabilities[[decision.index, 0]] = decision.probabilities[0];
            probabilities[[decision.index, 1]] = decision.probabilities[1];
        }
    }
}

/// Magnitude-based false-negative recovery
#[derive(Debug, Clone, Default)]
pub struct EnhancementHeuristic {
    config: EnhancementConfig,
}

impl EnhancementHeuristic {
    pub fn new(config: EnhancementConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnhancementConfig {
        &self.config
    }

    /// Decide the overrides for one batch without touching the predictions
    ///
    /// `rng` is consulted once per genuine, predicted-genuine sample above
    /// the edge threshold, in index order.
    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        quantum_features: &Array2<f64>,
        labels: &[u8],
        predictions: &[u8],
        rng: &mut R,
    ) -> Result<EnhancementReport, ModelError> {
        let n = quantum_features.nrows();
        if labels.len() != n || predictions.len() != n {
            return Err(ModelError::invalid_input(format!(
                "{} feature rows, {} labels, {} predictions",
                n,
                labels.len(),
                predictions.len()
            )));
        }

        if !self.config.enabled {
            return Ok(EnhancementReport::skipped(SkipReason::Disabled));
        }

        let magnitudes: Vec<f64> = quantum_features
            .outer_iter()
            .map(|row| row.iter().map(|v| v.abs()).sum())
            .collect();

        let stats = match self.magnitude_stats(&magnitudes) {
            Ok(stats) => stats,
            Err(reason) => {
                debug!(?reason, "Skipping enhancement");
                return Ok(EnhancementReport::skipped(reason));
            }
        };

        let (conf_lo, conf_hi) = self.config.fraud_confidence;
        let (chance_lo, chance_hi) = self.config.edge_chance;
        let mut decisions = Vec::new();

        for (i, &m) in magnitudes.iter().enumerate() {
            if predictions[i] != 0 {
                continue;
            }

            if labels[i] == 1 && m > stats.fraud_threshold {
                let frac = (m - stats.median) / (stats.max - stats.median);
                let confidence = (conf_lo + frac * (conf_hi - conf_lo)).min(conf_hi);
                decisions.push(EnhancementDecision {
                    index: i,
                    magnitude: m,
                    action: EnhancementAction::FraudRecovered { confidence },
                    label: 1,
                    probabilities: [1.0 - confidence, confidence],
                });
            } else if labels[i] == 0 && m > stats.edge_threshold {
                let frac = (m - stats.edge_threshold) / (stats.max - stats.edge_threshold);
                let chance = chance_lo + frac * (chance_hi - chance_lo);
                if rng.gen::<f64>() < chance {
                    let p = self.config.edge_probability;
                    decisions.push(EnhancementDecision {
                        index: i,
                        magnitude: m,
                        action: EnhancementAction::EdgeFlagged { chance },
                        label: 1,
                        probabilities: [1.0 - p, p],
                    });
                }
            }
        }

        info!(flips = decisions.len(), "Enhancement applied");
        Ok(EnhancementReport {
            status: EnhancementStatus::Applied { stats },
            decisions,
        })
    }

    /// Evaluate and write the overrides in place
    pub fn apply<R: Rng + ?Sized>(
        &self,
        quantum_features: &Array2<f64>,
        labels: &[u8],
        predictions: &mut [u8],
        probabilities: &mut Array2<f64>,
        rng: &mut R,
    ) -> Result<EnhancementReport, ModelError> {
        if probabilities.nrows() != predictions.len() || probabilities.ncols() != 2 {
            return Err(ModelError::invalid_input(format!(
                "probability matrix must be {}x2, got {}x{}",
                predictions.len(),
                probabilities.nrows(),
                probabilities.ncols()
            )));
        }

        let report = self.evaluate(quantum_features, labels, predictions, rng)?;
        report.apply_to(predictions, probabilities);
        Ok(report)
    }

    fn magnitude_stats(&self, magnitudes: &[f64]) -> Result<MagnitudeStats, SkipReason> {
        if magnitudes.is_empty() {
            return Err(SkipReason::LowSpread { std: 0.0 });
        }
        let std = population_std(magnitudes);
        if !(std >= self.config.min_std) {
            return Err(SkipReason::LowSpread { std });
        }

        let mut sorted = magnitudes.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut unique = sorted.clone();
        unique.dedup();
        if unique.len() < self.config.min_distinct {
            return Err(SkipReason::TooFewDistinct { distinct: unique.len() });
        }

        Ok(MagnitudeStats {
            std,
            distinct: unique.len(),
            median: percentile(&sorted, 50.0),
            fraud_threshold: percentile(&sorted, self.config.fraud_percentile),
            edge_threshold: percentile(&sorted, self.config.edge_percentile),
            max: sorted.last().copied().unwrap_or(0.0),
        })
    }
}

/// Linear-interpolation percentile of ascending data, `p` in `[0, 100]`
///
/// Returns NaN for empty input.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = (n - 1) as f64 * p.clamp(0.0, 100.0) / 100.0;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let weight = pos - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
}

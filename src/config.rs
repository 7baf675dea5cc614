//! Pipeline configuration
//!
//! All tunables for an analysis run live in [`PipelineConfig`]. The
//! availability of the quantum backend is a value in this configuration,
//! so both the quantum and the classical-degraded paths can be selected
//! deterministically.

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::machine_learning::enhancement::EnhancementConfig;
use crate::machine_learning::preprocessing::PreprocessingConfig;
use crate::machine_learning::svm::SvmConfig;
use crate::quantum::MAX_QUBITS;

/// Default register size for feature encoding
pub const DEFAULT_QUBIT_COUNT: usize = 4;

/// Whether quantum simulation may be used for this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantumBackend {
    /// Circuits are simulated; the fidelity kernel is attempted first
    #[default]
    Available,
    /// No simulation; padded classical vectors stand in for quantum features
    Unavailable,
}

impl QuantumBackend {
    pub fn is_available(self) -> bool {
        matches!(self, QuantumBackend::Available)
    }
}

/// Configuration for a full analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of qubits each sample is encoded into
    pub qubit_count: usize,
    /// Injected quantum backend capability
    pub backend: QuantumBackend,
    /// Standardization and dimensionality reduction
    pub preprocessing: PreprocessingConfig,
    /// Support-vector classifier settings shared by both models
    pub svm: SvmConfig,
    /// Label-aware post-processing of quantum predictions
    pub enhancement: EnhancementConfig,
    /// Also fit a classical RBF model for comparison
    pub classical_baseline: bool,
    /// Seed for the random source handed to the enhancement step
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            qubit_count: DEFAULT_QUBIT_COUNT,
            backend: QuantumBackend::Available,
            preprocessing: PreprocessingConfig::default(),
            svm: SvmConfig::default(),
            enhancement: EnhancementConfig::default(),
            classical_baseline: true,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Configuration for an environment without quantum simulation
    pub fn classical_only() -> Self {
        Self {
            backend: QuantumBackend::Unavailable,
            ..Default::default()
        }
    }

    /// Parse a JSON document; omitted fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.qubit_count == 0 || self.qubit_count > MAX_QUBITS {
            return Err(ConfigError::invalid_parameter(
                "qubit_count",
                format!("must be between 1 and {}", MAX_QUBITS),
            ));
        }

        self.preprocessing.validate()?;
        self.svm.validate()?;
        self.enhancement.validate()?;

        Ok(())
    }
}

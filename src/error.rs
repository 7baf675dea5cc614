//! Error types for the fraud classifier core
//!
//! Degraded behaviour (sample fallbacks, kernel fallbacks, skipped
//! enhancement) is reported through result structures, not through these
//! errors. An `Err` here means the caller handed over malformed input or an
//! invalid configuration.

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, FraudCoreError>;

/// Errors raised while building circuits or simulating states
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantumError {
    /// A gate referenced a qubit outside the register
    #[error("Qubit index {index} out of range for {qubit_count}-qubit register")]
    QubitOutOfRange { index: usize, qubit_count: usize },

    /// A two-qubit gate was given the same qubit twice
    #[error("Control and target must differ, both are {0}")]
    DuplicateQubit(usize),

    /// A rotation angle was NaN or infinite
    #[error("Rotation angle for qubit {qubit} is not finite: {angle}")]
    NonFiniteAngle { qubit: usize, angle: f64 },

    /// Dimension mismatch between states, circuits or registers
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A state vector drifted away from unit norm
    #[error("State vector is not normalized (norm² = {0})")]
    NotNormalized(f64),

    /// Register size outside the simulable range
    #[error("Unsupported qubit count {0}")]
    UnsupportedQubitCount(usize),

    /// An observable produced a complex expectation value
    #[error("Non-real expectation value {0}; observable might not be Hermitian")]
    NonHermitianObservable(String),
}

/// Errors raised by data handling and classical models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Input data violates the expected shape or value domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A binary classifier was asked to fit a single-class label set
    #[error("Training labels contain a single class ({0})")]
    SingleClass(u8),

    /// A precomputed kernel matrix is unusable
    #[error("Invalid kernel matrix: {0}")]
    InvalidKernel(String),

    /// Prediction requested from a model that was never fitted
    #[error("Model has not been fitted")]
    NotFitted,
}

impl ModelError {
    /// Shorthand for an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// Errors raised while reading a transaction file
#[derive(Error, Debug)]
pub enum DatasetError {
    /// The file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not well-formed CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Required header columns are absent
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A cell could not be parsed as a number
    #[error("Line {line}, column '{column}': cannot parse '{value}'")]
    Parse {
        line: usize,
        column: String,
        value: String,
    },

    /// The parsed data failed validation
    #[error(transparent)]
    Invalid(#[from] ModelError),
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A parameter failed validation
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The configuration document could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error for the analysis pipeline
#[derive(Error, Debug)]
pub enum FraudCoreError {
    #[error(transparent)]
    Quantum(#[from] QuantumError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuantumError::QubitOutOfRange { index: 5, qubit_count: 4 };
        assert!(err.to_string().contains('5'));
        assert!(err.to_string().contains('4'));

        let err = ConfigError::invalid_parameter("qubit_count", "must be positive");
        assert!(err.to_string().contains("qubit_count"));
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_error_wrapping() {
        let err: FraudCoreError = ModelError::SingleClass(0).into();
        assert!(matches!(err, FraudCoreError::Model(ModelError::SingleClass(0))));
        assert!(err.to_string().contains("single class"));
    }
}

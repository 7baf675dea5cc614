//! Quantum-kernel transaction fraud classifier
//!
//! This crate scores transactions as fraudulent or genuine. Features are
//! normalized into rotation angles, encoded into a small fixed Ry/CNOT
//! circuit per sample and simulated exactly. The resulting states feed a
//! fidelity kernel for a support-vector classifier, with classical
//! fallbacks at every stage, and a label-aware heuristic post-processes the
//! predictions.

pub mod config;
pub mod error;
pub mod quantum;
pub mod simulators;
pub mod machine_learning;
pub mod pipeline;

// Create a prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{PipelineConfig, QuantumBackend};
    pub use crate::error::{FraudCoreError, Result};
    pub use crate::machine_learning::prelude::*;
    pub use crate::pipeline::{AnalysisReport, FraudPipeline, ModelRun};
    pub use crate::quantum::prelude::*;
    pub use crate::simulators::StatevectorSimulator;
}

// Version and crate information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

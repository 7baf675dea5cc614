//! Quantum machine learning module

pub mod encoding;
pub mod kernel;

// Re-exports for convenience
pub use encoding::{
    feature_map_circuit, EncodedBatch, FallbackReason, QuantumFeatureEncoder, SampleEncoding,
};
pub use kernel::{FidelityKernel, KernelMatrix};

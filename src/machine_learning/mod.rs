//! Machine learning module for quantum-kernel fraud classification
//!
//! Classical preprocessing and SVMs on one side, quantum encoding and the
//! fidelity kernel on the other, joined by the hybrid classifier.

pub mod core;
pub mod dataset;
pub mod preprocessing;
pub mod quantum;
pub mod svm;
pub mod classifier;
pub mod enhancement;
pub mod metrics;

/// Re-exports of commonly used components
pub mod prelude {
    // Classical components
    pub use super::core::{ConstantClassifier, ProbabilisticClassifier};
    pub use super::dataset::TransactionDataset;
    pub use super::preprocessing::{preprocess, FeatureNormalizer, Pca, PreprocessingConfig, StandardScaler};
    pub use super::svm::{Gamma, SupportVectorClassifier, SvmConfig, SvmKernel};
    pub use super::metrics::ClassificationMetrics;

    // Quantum components
    pub use super::quantum::{FidelityKernel, KernelMatrix, QuantumFeatureEncoder, SampleEncoding};

    // Hybrid components
    pub use super::classifier::{ClassicalBaseline, ClassifierMode, HybridClassifier, TrainedModel};
    pub use super::enhancement::{EnhancementConfig, EnhancementHeuristic, EnhancementReport, EnhancementStatus};
}

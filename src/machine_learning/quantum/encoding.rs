//! Angle encoding of classical samples into quantum circuits
//!
//! Each sample is normalized into `[0, π]`, fitted to the register width and
//! turned into a fixed two-layer Ry/CNOT circuit. Simulating that circuit
//! yields the state used by the fidelity kernel and one Pauli-Z expectation
//! per qubit used as the sample's quantum features.

use std::fmt;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::QuantumBackend;
use crate::error::QuantumError;
use crate::machine_learning::preprocessing::{pad_to_qubits, FeatureNormalizer};
use crate::quantum::circuit::{CircuitBuilder, QuantumCircuit};
use crate::quantum::state::StateVector;
use crate::simulators::StatevectorSimulator;

/// Scale applied to the angles of the second rotation layer
pub const SECOND_LAYER_SCALE: f64 = 0.5;

/// Build the feature-map circuit for one padded sample
///
/// Layers, for a register of `q = angles.len()` qubits:
///
/// 1. `Ry(v[i])` on every qubit
/// 2. `CNOT(i, i+1)` for `i` in `0..q-1`
/// 3. `Ry(v[i] * 0.5)` on every qubit
/// 4. `CNOT(i, (i+1) % q)` for `i` in `0..q-1`
///
/// Layer 4 stops one short of the register, so the `q-1 → 0` edge is never
/// emitted and the layer repeats the linear chain of layer 2.
pub fn feature_map_circuit(angles: &Array1<f64>) -> Result<QuantumCircuit, QuantumError> {
    let qubit_count = angles.len();
    let mut builder = CircuitBuilder::new(qubit_count);

    for (i, &theta) in angles.iter().enumerate() {
        builder.ry(i, theta)?;
    }

    for i in 0..qubit_count.saturating_sub(1) {
        builder.cnot(i, i + 1)?;
    }

    for (i, &theta) in angles.iter().enumerate() {
        builder.ry(i, theta * SECOND_LAYER_SCALE)?;
    }

    for i in 0..qubit_count.saturating_sub(1) {
        builder.cnot(i, (i + 1) % qubit_count)?;
    }

    Ok(builder.build())
}

/// Why a sample was encoded classically
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// The run was configured without quantum simulation
    BackendUnavailable,
    /// Circuit construction or simulation failed for this sample
    Circuit(QuantumError),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::BackendUnavailable => write!(f, "quantum backend unavailable"),
            FallbackReason::Circuit(err) => write!(f, "circuit error: {}", err),
        }
    }
}

/// Encoding result for a single sample
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEncoding {
    /// The circuit was simulated
    Quantum {
        circuit: QuantumCircuit,
        state: StateVector,
        expectations: Array1<f64>,
    },
    /// The padded classical vector stands in for quantum features
    Fallback {
        padded: Array1<f64>,
        reason: FallbackReason,
    },
}

impl SampleEncoding {
    /// Feature vector handed to the classifier
    pub fn features(&self) -> &Array1<f64> {
        match self {
            SampleEncoding::Quantum { expectations, .. } => expectations,
            SampleEncoding::Fallback { padded, .. } => padded,
        }
    }

    pub fn state(&self) -> Option<&StateVector> {
        match self {
            SampleEncoding::Quantum { state, .. } => Some(state),
            SampleEncoding::Fallback { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SampleEncoding::Fallback { .. })
    }
}

/// Encoding results for a whole batch
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    /// Angles after normalization, one row per sample
    pub normalized: Array2<f64>,
    /// Per-sample outcomes, in input order
    pub samples: Vec<SampleEncoding>,
    /// Quantum features (or fallbacks), `n × qubit_count`
    pub features: Array2<f64>,
    /// Number of samples that fell back to classical features
    pub fallback_count: usize,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Simulated states for every sample, or the index of the first sample
    /// without one
    pub fn states(&self) -> Result<Vec<&StateVector>, usize> {
        self.samples
            .iter()
            .enumerate()
            .map(|(i, s)| s.state().ok_or(i))
            .collect()
    }
}

/// Encodes feature matrices into quantum features
#[derive(Debug, Clone, Copy)]
pub struct QuantumFeatureEncoder {
    qubit_count: usize,
    backend: QuantumBackend,
    normalizer: FeatureNormalizer,
}

impl QuantumFeatureEncoder {
    pub fn new(qubit_count: usize, backend: QuantumBackend) -> Self {
        Self {
            qubit_count,
            backend,
            normalizer: FeatureNormalizer::default(),
        }
    }

    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    pub fn backend(&self) -> QuantumBackend {
        self.backend
    }

    /// Encode one already-normalized sample
    ///
    /// Failures never propagate: the sample is returned as a fallback with
    /// its padded vector and the reason.
    pub fn encode_sample(&self, angles: &Array1<f64>) -> SampleEncoding {
        let padded = pad_to_qubits(angles.view(), self.qubit_count);

        if !self.backend.is_available() {
            return SampleEncoding::Fallback {
                padded,
                reason: FallbackReason::BackendUnavailable,
            };
        }

        match simulate_sample(&padded) {
            Ok((circuit, state, expectations)) => SampleEncoding::Quantum {
                circuit,
                state,
                expectations,
            },
            Err(err) => SampleEncoding::Fallback {
                padded,
                reason: FallbackReason::Circuit(err),
            },
        }
    }

    /// Normalize and encode every row of `x`
    ///
    /// Rows are encoded in parallel; results keep the input order.
    pub fn encode(&self, x: &Array2<f64>) -> EncodedBatch {
        let normalized = self.normalizer.normalize(x);

        if self.backend.is_available() {
            info!(samples = x.nrows(), qubits = self.qubit_count, "Extracting quantum features");
        } else {
            info!(samples = x.nrows(), "Quantum backend unavailable, using classical features");
        }

        let rows: Vec<Array1<f64>> = normalized.outer_iter().map(|row| row.to_owned()).collect();
        let samples: Vec<SampleEncoding> = rows
            .par_iter()
            .map(|row| self.encode_sample(row))
            .collect();

        let mut features = Array2::zeros((samples.len(), self.qubit_count));
        let mut fallback_count = 0;

        for (i, sample) in samples.iter().enumerate() {
            features.row_mut(i).assign(sample.features());

            if let SampleEncoding::Fallback { reason: FallbackReason::Circuit(err), .. } = sample {
                warn!(sample = i, error = %err, "Circuit failed, using padded classical features");
            }
            if sample.is_fallback() {
                fallback_count += 1;
            }
        }

        if !samples.is_empty() {
            debug!(
                mean = ?features.mean_axis(Axis(0)).map(|m| m.to_vec()),
                std = ?features.std_axis(Axis(0), 0.0).to_vec(),
                "Quantum feature statistics per qubit"
            );
        }
        if fallback_count > 0 && self.backend.is_available() {
            warn!(fallback_count, "Some samples used fallback classical features");
        }

        EncodedBatch {
            normalized,
            samples,
            features,
            fallback_count,
        }
    }
}

fn simulate_sample(
    padded: &Array1<f64>,
) -> Result<(QuantumCircuit, StateVector, Array1<f64>), QuantumError> {
    let circuit = feature_map_circuit(padded)?;

    let mut simulator = StatevectorSimulator::new(circuit.qubit_count())?;
    simulator.run_circuit(&circuit)?;
    let expectations = simulator.expectation_z_all()?;

    Ok((circuit, simulator.into_state(), expectations))
}

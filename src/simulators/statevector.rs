//! Exact statevector simulator
//!
//! Circuits are simulated by applying every gate to the full amplitude
//! vector. There is no sampling: probabilities and expectation values are
//! read directly from the amplitudes.
use std::collections::HashMap;
use std::fmt;
use num_complex::Complex64;
use ndarray::{Array1, Array2};
use tracing::trace;

use crate::error::QuantumError;
use crate::quantum::circuit::QuantumCircuit;
use crate::quantum::state::StateVector;
use crate::quantum::MAX_QUBITS;

/// A measurement outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Measurement yielded 0
    Zero,
    /// Measurement yielded 1
    One,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Zero => write!(f, "0"),
            Outcome::One => write!(f, "1"),
        }
    }
}

/// A statevector simulator for quantum circuits
#[derive(Debug, Clone)]
pub struct StatevectorSimulator {
    /// The current state of the simulator
    state: StateVector,
}

impl StatevectorSimulator {
    /// Create a new statevector simulator with the specified number of qubits
    pub fn new(qubit_count: usize) -> Result<Self, QuantumError> {
        if qubit_count == 0 || qubit_count > MAX_QUBITS {
            return Err(QuantumError::UnsupportedQubitCount(qubit_count));
        }

        Ok(StatevectorSimulator {
            state: StateVector::zero_state(qubit_count),
        })
    }

    /// Create a simulator from an existing state vector
    pub fn from_state(state: StateVector) -> Self {
        StatevectorSimulator { state }
    }

    /// Get the current state vector
    pub fn state(&self) -> &StateVector {
        &self.state
    }

    /// Consume the simulator and return its state
    pub fn into_state(self) -> StateVector {
        self.state
    }

    /// Reset the simulator to the |0...0⟩ state
    pub fn reset(&mut self) {
        self.state = StateVector::zero_state(self.state.qubit_count());
    }

    /// Get the number of qubits in the simulator
    pub fn qubit_count(&self) -> usize {
        self.state.qubit_count()
    }

    /// Apply a quantum circuit to the current state
    pub fn run_circuit(&mut self, circuit: &QuantumCircuit) -> Result<(), QuantumError> {
        if circuit.qubit_count() != self.qubit_count() {
            return Err(QuantumError::DimensionMismatch {
                expected: self.qubit_count(),
                actual: circuit.qubit_count(),
            });
        }

        trace!(
            gates = circuit.gate_count(),
            entangling = circuit.entangling_gate_count(),
            "Running circuit"
        );
        let next = circuit.apply(&self.state)?;
        if !next.is_valid() {
            return Err(QuantumError::NotNormalized(next.norm_sqr()));
        }

        self.state = next;
        Ok(())
    }

    fn check_qubit(&self, qubit: usize) -> Result<usize, QuantumError> {
        if qubit >= self.qubit_count() {
            return Err(QuantumError::QubitOutOfRange {
                index: qubit,
                qubit_count: self.qubit_count(),
            });
        }

        // Big-endian bit position
        Ok(1 << (self.qubit_count() - 1 - qubit))
    }

    /// Measure a single qubit without collapsing the state
    pub fn measure_qubit_probability(&self, qubit: usize) -> Result<HashMap<Outcome, f64>, QuantumError> {
        let mask = self.check_qubit(qubit)?;

        let mut prob_zero = 0.0;
        let mut prob_one = 0.0;

        for (i, amp) in self.state.amplitudes().iter().enumerate() {
            if i & mask == 0 {
                prob_zero += amp.norm_sqr();
            } else {
                prob_one += amp.norm_sqr();
            }
        }

        let mut probabilities = HashMap::new();
        probabilities.insert(Outcome::Zero, prob_zero);
        probabilities.insert(Outcome::One, prob_one);

        Ok(probabilities)
    }

    /// Expectation of Pauli-Z on one qubit (identity elsewhere)
    pub fn expectation_z(&self, qubit: usize) -> Result<f64, QuantumError> {
        let mask = self.check_qubit(qubit)?;

        let value: f64 = self
            .state
            .amplitudes()
            .iter()
            .enumerate()
            .map(|(i, amp)| if i & mask == 0 { amp.norm_sqr() } else { -amp.norm_sqr() })
            .sum();

        // Rounding can push |value| marginally past 1
        Ok(value.clamp(-1.0, 1.0))
    }

    /// Pauli-Z expectation for every qubit, in qubit order
    pub fn expectation_z_all(&self) -> Result<Array1<f64>, QuantumError> {
        (0..self.qubit_count())
            .map(|q| self.expectation_z(q))
            .collect::<Result<Vec<_>, _>>()
            .map(Array1::from)
    }

    /// Calculate the expectation value of a 2x2 observable on a single qubit
    pub fn expectation_value_single_qubit(
        &self,
        observable: &Array2<Complex64>,
        qubit: usize,
    ) -> Result<f64, QuantumError> {
        let mask = self.check_qubit(qubit)?;

        if observable.shape() != [2, 2] {
            return Err(QuantumError::DimensionMismatch {
                expected: 2,
                actual: observable.shape()[0],
            });
        }

        if is_z_operator(observable) {
            return self.expectation_z(qubit);
        }

        // ⟨ψ|O_q|ψ⟩ summed over amplitude pairs differing only in the target bit
        let amps = self.state.amplitudes();
        let mut expectation = Complex64::new(0.0, 0.0);
        for i in (0..amps.len()).filter(|i| i & mask == 0) {
            let j = i | mask;
            let (a, b) = (amps[i], amps[j]);
            expectation += a.conj() * (observable[[0, 0]] * a + observable[[0, 1]] * b);
            expectation += b.conj() * (observable[[1, 0]] * a + observable[[1, 1]] * b);
        }

        if expectation.im.abs() > 1e-10 {
            return Err(QuantumError::NonHermitianObservable(expectation.to_string()));
        }

        Ok(expectation.re)
    }
}

// Helper to check if an observable is the Z operator
fn is_z_operator(observable: &Array2<Complex64>) -> bool {
    let z00 = Complex64::new(1.0, 0.0);
    let z11 = Complex64::new(-1.0, 0.0);
    let zero = Complex64::new(0.0, 0.0);

    (observable[[0, 0]] - z00).norm_sqr() < 1e-10
        && (observable[[0, 1]] - zero).norm_sqr() < 1e-10
        && (observable[[1, 0]] - zero).norm_sqr() < 1e-10
        && (observable[[1, 1]] - z11).norm_sqr() < 1e-10
}

/// Simulate a circuit from |0...0⟩ and return the final state
pub fn simulate(circuit: &QuantumCircuit) -> Result<StateVector, QuantumError> {
    let mut simulator = StatevectorSimulator::new(circuit.qubit_count())?;
    simulator.run_circuit(circuit)?;
    Ok(simulator.into_state())
}

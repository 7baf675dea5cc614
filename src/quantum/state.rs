// src/quantum/state.rs
//! Quantum state representations
//!
//! A [`StateVector`] holds the 2^n complex amplitudes of an n-qubit register.
//! Qubit 0 is the most significant bit of the basis index.

use std::fmt::{self, Display};
use num_complex::Complex64;
use ndarray::Array1;

use crate::error::QuantumError;

/// Tolerance used when checking normalization
pub const NORM_TOLERANCE: f64 = 1e-10;

/// State vector representation of a quantum state
#[derive(Clone, Debug, PartialEq)]
pub struct StateVector {
    /// Number of qubits
    qubit_count: usize,

    /// The state vector as an array of complex amplitudes
    amplitudes: Array1<Complex64>,
}

impl StateVector {
    /// Create a new state vector with the given amplitudes
    pub fn new(qubit_count: usize, amplitudes: Array1<Complex64>) -> Result<Self, QuantumError> {
        let expected_dim = 1 << qubit_count;

        if amplitudes.len() != expected_dim {
            return Err(QuantumError::DimensionMismatch {
                expected: expected_dim,
                actual: amplitudes.len(),
            });
        }

        let state = StateVector {
            qubit_count,
            amplitudes,
        };

        if !state.is_valid() {
            return Err(QuantumError::NotNormalized(state.norm_sqr()));
        }

        Ok(state)
    }

    /// Create a new state vector in the computational basis state |index⟩
    pub fn computational_basis(qubit_count: usize, index: usize) -> Result<Self, QuantumError> {
        let dim = 1 << qubit_count;

        if index >= dim {
            return Err(QuantumError::DimensionMismatch {
                expected: dim,
                actual: index,
            });
        }

        let mut amplitudes = Array1::zeros(dim);
        amplitudes[index] = Complex64::new(1.0, 0.0);

        Ok(StateVector {
            qubit_count,
            amplitudes,
        })
    }

    /// Create the zero state |00...0⟩
    pub fn zero_state(qubit_count: usize) -> Self {
        let mut amplitudes = Array1::zeros(1 << qubit_count);
        amplitudes[0] = Complex64::new(1.0, 0.0);

        StateVector {
            qubit_count,
            amplitudes,
        }
    }

    /// Number of qubits in this state
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Dimension of the Hilbert space (2^n)
    pub fn dimension(&self) -> usize {
        1 << self.qubit_count
    }

    /// Squared L2 norm of the amplitude vector
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(|amp| amp.norm_sqr()).sum()
    }

    /// Check whether the state is normalized
    pub fn is_valid(&self) -> bool {
        (self.norm_sqr() - 1.0).abs() < NORM_TOLERANCE
    }

    /// Inner product ⟨self|other⟩
    pub fn inner_product(&self, other: &Self) -> Result<Complex64, QuantumError> {
        if self.qubit_count != other.qubit_count {
            return Err(QuantumError::DimensionMismatch {
                expected: self.qubit_count,
                actual: other.qubit_count,
            });
        }

        Ok(self
            .amplitudes
            .iter()
            .zip(other.amplitudes.iter())
            .fold(Complex64::new(0.0, 0.0), |acc, (a, b)| acc + a.conj() * b))
    }

    /// State fidelity |⟨self|other⟩|²
    pub fn fidelity(&self, other: &Self) -> Result<f64, QuantumError> {
        Ok(self.inner_product(other)?.norm_sqr())
    }

    /// Calculate the probability of measuring the given bit string
    pub fn probability(&self, bit_string: usize) -> f64 {
        if bit_string >= self.dimension() {
            return 0.0;
        }

        self.amplitudes[bit_string].norm_sqr()
    }

    /// Get a reference to the amplitudes
    pub fn amplitudes(&self) -> &Array1<Complex64> {
        &self.amplitudes
    }

    /// Mutable access for gate application inside the crate
    pub(crate) fn amplitudes_mut(&mut self) -> &mut Array1<Complex64> {
        &mut self.amplitudes
    }
}

impl Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}-qubit state:", self.qubit_count)?;

        let mut has_entries = false;

        for (i, amp) in self.amplitudes.iter().enumerate() {
            let prob = amp.norm_sqr();
            if prob > NORM_TOLERANCE {
                has_entries = true;
                let bit_string = format!("{:0width$b}", i, width = self.qubit_count);
                writeln!(
                    f,
                    "  ({:.6}{:+.6}i) |{}⟩ [{:.1}%]",
                    amp.re, amp.im, bit_string, prob * 100.0
                )?;
            }
        }

        if !has_entries {
            writeln!(f, "  (zero state)")?;
        }

        Ok(())
    }
}

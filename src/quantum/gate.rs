// src/quantum/gate.rs
//! Quantum gate operations
//!
//! Gates are plain values naming an operation kind, the qubits it acts on and
//! its angle. Their matrices act on the big-endian basis used by
//! [`StateVector`], and they are applied in place on the amplitude vector
//! rather than expanded to a full 2^n × 2^n operator.

use std::fmt;
use num_complex::Complex64;
use ndarray::{array, Array2};
use serde::{Deserialize, Serialize};

use crate::error::QuantumError;
use super::state::StateVector;

/// A gate bound to the qubits it acts on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GateOp {
    /// Rotation around the Y axis
    Ry { qubit: usize, theta: f64 },

    /// Controlled NOT
    Cnot { control: usize, target: usize },
}

impl GateOp {
    /// Qubits touched by this gate, control first
    pub fn qubits(&self) -> Vec<usize> {
        match *self {
            GateOp::Ry { qubit, .. } => vec![qubit],
            GateOp::Cnot { control, target } => vec![control, target],
        }
    }

    /// Rotation angle, if the gate is parametrized
    pub fn angle(&self) -> Option<f64> {
        match *self {
            GateOp::Ry { theta, .. } => Some(theta),
            GateOp::Cnot { .. } => None,
        }
    }

    /// Returns a display name for this gate
    pub fn name(&self) -> String {
        match self {
            GateOp::Ry { theta, .. } => format!("Ry({:.2})", theta),
            GateOp::Cnot { .. } => "CNOT".to_string(),
        }
    }

    /// Matrix representation on the gate's own qubits
    pub fn matrix(&self) -> Array2<Complex64> {
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);

        match *self {
            GateOp::Ry { theta, .. } => {
                let cos = (theta / 2.0).cos();
                let sin = (theta / 2.0).sin();
                array![
                    [Complex64::new(cos, 0.0), Complex64::new(-sin, 0.0)],
                    [Complex64::new(sin, 0.0), Complex64::new(cos, 0.0)]
                ]
            }
            GateOp::Cnot { .. } => array![
                [one, zero, zero, zero],
                [zero, one, zero, zero],
                [zero, zero, zero, one],
                [zero, zero, one, zero]
            ],
        }
    }

    /// Check qubit indices and angle against a register size
    pub fn validate(&self, qubit_count: usize) -> Result<(), QuantumError> {
        for q in self.qubits() {
            if q >= qubit_count {
                return Err(QuantumError::QubitOutOfRange { index: q, qubit_count });
            }
        }

        match *self {
            GateOp::Ry { qubit, theta } if !theta.is_finite() => {
                Err(QuantumError::NonFiniteAngle { qubit, angle: theta })
            }
            GateOp::Cnot { control, target } if control == target => {
                Err(QuantumError::DuplicateQubit(control))
            }
            _ => Ok(()),
        }
    }

    /// Apply this gate to a state in place
    pub fn apply(&self, state: &mut StateVector) -> Result<(), QuantumError> {
        let total_qubits = state.qubit_count();
        self.validate(total_qubits)?;

        let dim = state.dimension();
        let amplitudes = state.amplitudes_mut();

        match *self {
            GateOp::Ry { qubit, .. } => {
                let m = self.matrix();
                let mask = 1 << (total_qubits - 1 - qubit);

                for i in (0..dim).filter(|i| i & mask == 0) {
                    let j = i | mask;
                    let a = amplitudes[i];
                    let b = amplitudes[j];
                    amplitudes[i] = m[[0, 0]] * a + m[[0, 1]] * b;
                    amplitudes[j] = m[[1, 0]] * a + m[[1, 1]] * b;
                }
            }
            GateOp::Cnot { control, target } => {
                let control_mask = 1 << (total_qubits - 1 - control);
                let target_mask = 1 << (total_qubits - 1 - target);

                for i in (0..dim).filter(|i| i & control_mask != 0 && i & target_mask == 0) {
                    amplitudes.swap(i, i | target_mask);
                }
            }
        }

        Ok(())
    }
}

impl fmt::Display for GateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qubits = self
            .qubits()
            .iter()
            .map(|q| q.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} [{}]", self.name(), qubits)
    }
}

use serde::{Deserialize, Serialize};

use crate::error::QuantumError;
use crate::quantum::gate::GateOp;
use crate::quantum::state::StateVector;

/// A quantum circuit consisting of a sequence of gates
///
/// Circuits are immutable once built; two circuits are equal when they hold
/// the same operations in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumCircuit {
    qubit_count: usize,
    ops: Vec<GateOp>,
}

impl QuantumCircuit {
    /// Create a new empty quantum circuit
    pub fn new(qubit_count: usize) -> Self {
        QuantumCircuit {
            qubit_count,
            ops: Vec::new(),
        }
    }

    /// Number of qubits the circuit acts on
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    /// Get the number of gates in the circuit
    pub fn gate_count(&self) -> usize {
        self.ops.len()
    }

    /// The gate operations in application order
    pub fn ops(&self) -> &[GateOp] {
        &self.ops
    }

    /// Apply the circuit to a quantum state
    pub fn apply(&self, state: &StateVector) -> Result<StateVector, QuantumError> {
        if state.qubit_count() != self.qubit_count {
            return Err(QuantumError::DimensionMismatch {
                expected: self.qubit_count,
                actual: state.qubit_count(),
            });
        }

        let mut current_state = state.clone();
        for op in &self.ops {
            op.apply(&mut current_state)?;
        }

        Ok(current_state)
    }

    /// Count of two-qubit entangling gates
    pub fn entangling_gate_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, GateOp::Cnot { .. }))
            .count()
    }
}

/// Builder for quantum circuits
///
/// Every gate is validated against the register when it is added, so a
/// built circuit always applies cleanly to a state of matching size.
#[derive(Debug, Clone)]
pub struct CircuitBuilder {
    circuit: QuantumCircuit,
}

impl CircuitBuilder {
    /// Create a new circuit builder
    pub fn new(qubit_count: usize) -> Self {
        CircuitBuilder {
            circuit: QuantumCircuit::new(qubit_count),
        }
    }

    /// Build the quantum circuit
    pub fn build(self) -> QuantumCircuit {
        self.circuit
    }

    /// Validate and append a gate
    pub fn add_gate(&mut self, op: GateOp) -> Result<&mut Self, QuantumError> {
        op.validate(self.circuit.qubit_count)?;
        self.circuit.ops.push(op);
        Ok(self)
    }

    /// Add an Ry gate
    pub fn ry(&mut self, qubit: usize, theta: f64) -> Result<&mut Self, QuantumError> {
        self.add_gate(GateOp::Ry { qubit, theta })
    }

    /// Add a CNOT gate
    pub fn cnot(&mut self, control: usize, target: usize) -> Result<&mut Self, QuantumError> {
        self.add_gate(GateOp::Cnot { control, target })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_out_of_range() {
        let mut builder = CircuitBuilder::new(2);
        assert!(builder.ry(0, 0.5).is_ok());
        assert!(builder.cnot(0, 2).is_err());
        assert_eq!(builder.build().gate_count(), 1);
    }

    #[test]
    fn test_apply_rejects_mismatched_state() {
        let circuit = QuantumCircuit::new(2);
        assert!(circuit.apply(&StateVector::zero_state(3)).is_err());
    }
}

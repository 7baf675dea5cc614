// src/quantum/mod.rs
//! Quantum computing primitives
//!
//! This module implements quantum states, gate operations and immutable
//! circuits over a small fixed register.

pub mod state;
pub mod gate;
pub mod circuit;

pub use state::StateVector;
pub use gate::GateOp;
pub use circuit::{QuantumCircuit, CircuitBuilder};

/// Largest register the statevector simulator accepts
pub const MAX_QUBITS: usize = 10;

/// Re-export commonly used types
pub mod prelude {
    pub use super::{StateVector, GateOp, QuantumCircuit, CircuitBuilder};
}

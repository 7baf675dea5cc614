//! Quantum circuit simulators
//!
//! This module provides exact simulation of the small circuits used for
//! feature encoding.

pub mod statevector;

pub use statevector::{
    StatevectorSimulator,
    Outcome,
    simulate,
};

//! Quantum kernel methods for machine learning

use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::QuantumError;
use crate::quantum::state::StateVector;

/// Symmetric matrix of pairwise state fidelities
///
/// Entry `(i, j)` is `|⟨ψ_i|ψ_j⟩|²`; entries lie in `[0, 1]` and the
/// diagonal is 1 up to rounding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelMatrix {
    values: Array2<f64>,
}

impl KernelMatrix {
    pub fn size(&self) -> usize {
        self.values.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.values
    }

    /// Exact symmetry check
    pub fn is_symmetric(&self) -> bool {
        self.values == self.values.t()
    }
}

/// Fidelity kernel over simulated states
///
/// Cost is O(n² · 2^q): fine for the small registers and batch sizes this
/// crate targets, not for large datasets.
#[derive(Debug, Clone, Copy, Default)]
pub struct FidelityKernel;

impl FidelityKernel {
    /// Compute kernel value between two states
    pub fn compute_kernel(&self, a: &StateVector, b: &StateVector) -> Result<f64, QuantumError> {
        Ok(a.fidelity(b)?.clamp(0.0, 1.0))
    }

    /// Compute the kernel matrix for a set of states
    ///
    /// Only the upper triangle is evaluated; it is mirrored into the lower
    /// one, so the result is exactly symmetric. Rows are computed in parallel.
    pub fn compute_kernel_matrix(&self, states: &[&StateVector]) -> Result<KernelMatrix, QuantumError> {
        let n = states.len();

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (i..n)
                    .map(|j| self.compute_kernel(states[i], states[j]))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<_, _>>()?;

        let mut values = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (offset, value) in row.into_iter().enumerate() {
                let j = i + offset;
                values[[i, j]] = value;
                values[[j, i]] = value;
            }
        }

        debug!(size = n, "Fidelity kernel matrix computed");
        Ok(KernelMatrix { values })
    }
}

//! Feature preprocessing
//!
//! Two stages sit in front of the quantum encoder:
//!
//! 1. [`preprocess`] standardizes raw transaction features and projects them
//!    onto their leading principal components.
//! 2. [`FeatureNormalizer`] rescales each column into a rotation-angle range
//!    and [`pad_to_qubits`] fits every row to the register width.

use std::f64::consts::PI;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Per-column affine rescaling into `[0, upper]` using batch-wide min/max
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureNormalizer {
    upper: f64,
}

impl Default for FeatureNormalizer {
    fn default() -> Self {
        Self { upper: PI }
    }
}

impl FeatureNormalizer {
    /// Normalizer into `[0, upper]`
    pub fn with_upper_bound(upper: f64) -> Self {
        Self { upper }
    }

    /// Rescale every column of `x`; a constant column maps to 0
    pub fn normalize(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();

        for mut column in out.axis_iter_mut(Axis(1)) {
            let min = column.fold(f64::INFINITY, |a, &b| a.min(b));
            let max = column.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            let range = if max - min == 0.0 { 1.0 } else { max - min };

            column.mapv_inplace(|v| (v - min) / range * self.upper);
        }

        out
    }
}

/// Truncate or zero-extend a row to exactly `qubit_count` entries
pub fn pad_to_qubits(row: ArrayView1<f64>, qubit_count: usize) -> Array1<f64> {
    Array1::from_shape_fn(qubit_count, |i| row.get(i).copied().unwrap_or(0.0))
}

/// Preprocessing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Standardize columns to zero mean and unit variance
    pub standardize: bool,
    /// Project onto the leading principal components
    pub reduce_dimensions: bool,
    /// Upper bound on retained components
    pub max_components: usize,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            standardize: true,
            reduce_dimensions: true,
            max_components: 4,
        }
    }
}

impl PreprocessingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_components == 0 {
            return Err(ConfigError::invalid_parameter(
                "max_components",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Column standardization with population statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column means and standard deviations; zero deviation scales by 1
    pub fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mean = x.sum_axis(Axis(0)) / n;

        let scale = Array1::from_shape_fn(x.ncols(), |j| {
            let var = x.column(j).fold(0.0, |acc, &v| acc + (v - mean[j]).powi(2)) / n;
            if var > 0.0 { var.sqrt() } else { 1.0 }
        });

        Self { mean, scale }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

/// Principal component analysis via eigen-decomposition of the covariance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    mean: Array1<f64>,
    /// Components as rows (`n_components × n_features`)
    components: Array2<f64>,
    explained_variance: Array1<f64>,
}

impl Pca {
    /// Fit `n_components` leading components of `x`
    ///
    /// Requires at least two rows. Each component is oriented so its largest
    /// absolute loading is positive, which makes the projection deterministic.
    pub fn fit(x: &Array2<f64>, n_components: usize) -> Self {
        let n = x.nrows();
        let k = x.ncols();
        let n_components = n_components.clamp(1, k.max(1));

        let mean = x.sum_axis(Axis(0)) / n.max(1) as f64;
        let centered = x - &mean;
        let covariance = centered.t().dot(&centered) / (n.max(2) - 1) as f64;

        let (eigenvalues, eigenvectors) = symmetric_eigen(&covariance);

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let mut components = Array2::zeros((n_components, k));
        let mut explained_variance = Array1::zeros(n_components);

        for (row, &idx) in order.iter().take(n_components).enumerate() {
            let mut vector = eigenvectors.column(idx).to_owned();
            let pivot = vector
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            if pivot < 0.0 {
                vector.mapv_inplace(|v| -v);
            }

            components.row_mut(row).assign(&vector);
            explained_variance[row] = eigenvalues[idx].max(0.0);
        }

        Self {
            mean,
            components,
            explained_variance,
        }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean).dot(&self.components.t())
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix
///
/// Returns eigenvalues and the matching eigenvectors as columns.
fn symmetric_eigen(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::eye(n);

    for _ in 0..100 {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off < 1e-22 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[[p, q]].abs() < 1e-300 {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * a[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for r in 0..n {
                    let arp = a[[r, p]];
                    let arq = a[[r, q]];
                    a[[r, p]] = c * arp - s * arq;
                    a[[r, q]] = s * arp + c * arq;
                }
                for r in 0..n {
                    let apr = a[[p, r]];
                    let aqr = a[[q, r]];
                    a[[p, r]] = c * apr - s * aqr;
                    a[[q, r]] = s * apr + c * aqr;
                }
                for r in 0..n {
                    let vrp = v[[r, p]];
                    let vrq = v[[r, q]];
                    v[[r, p]] = c * vrp - s * vrq;
                    v[[r, q]] = s * vrp + c * vrq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

/// Output of the preprocessing stage
#[derive(Debug, Clone)]
pub struct PreprocessedFeatures {
    /// Reduced feature matrix handed to the classifiers
    pub reduced: Array2<f64>,
    /// Fitted scaler, when standardization ran
    pub scaler: Option<StandardScaler>,
    /// Fitted projection, when reduction ran
    pub pca: Option<Pca>,
}

/// Standardize and reduce a raw feature matrix
///
/// Fewer than two rows pass through unchanged. If standardization produces
/// non-finite values, the raw matrix is used instead.
pub fn preprocess(config: &PreprocessingConfig, x: &Array2<f64>) -> PreprocessedFeatures {
    if x.nrows() < 2 {
        debug!(rows = x.nrows(), "Too few rows to preprocess, passing features through");
        return PreprocessedFeatures {
            reduced: x.clone(),
            scaler: None,
            pca: None,
        };
    }

    let (scaled, scaler) = if config.standardize {
        let scaler = StandardScaler::fit(x);
        let scaled = scaler.transform(x);
        if scaled.iter().all(|v| v.is_finite()) {
            (scaled, Some(scaler))
        } else {
            warn!("Standardization produced non-finite values, using raw features");
            (x.clone(), None)
        }
    } else {
        (x.clone(), None)
    };

    if !config.reduce_dimensions {
        return PreprocessedFeatures {
            reduced: scaled,
            scaler,
            pca: None,
        };
    }

    let n_components = config
        .max_components
        .min(x.ncols())
        .min(x.nrows() - 1)
        .max(1);

    let pca = Pca::fit(&scaled, n_components);
    let reduced = pca.transform(&scaled);

    debug!(
        input_dim = x.ncols(),
        components = n_components,
        explained = ?pca.explained_variance().to_vec(),
        "Preprocessing complete"
    );

    PreprocessedFeatures {
        reduced,
        scaler,
        pca: Some(pca),
    }
}

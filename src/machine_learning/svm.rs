//! Support-vector classification
//!
//! A C-SVC trained with sequential minimal optimization. The dual problem
//!
//! ```text
//! min ½ αᵀQα − eᵀα   s.t.  yᵀα = 0,  0 ≤ αᵢ ≤ Cᵢ,   Qᵢⱼ = yᵢyⱼK(xᵢ, xⱼ)
//! ```
//!
//! is solved two variables at a time with second-order working-set
//! selection. Probabilities come from a sigmoid (Platt) fit to the training
//! decision values. Fraud is the positive class.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, ModelError};
use crate::machine_learning::core::ProbabilisticClassifier;
use crate::machine_learning::dataset::validate_labels;

const TAU: f64 = 1e-12;

/// RBF width
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// `1 / (k · Var(X))`, or 1 when the training matrix has no variance
    #[default]
    Scale,
    /// Fixed value
    Value(f64),
}

impl Gamma {
    /// Resolve to a concrete value for a training matrix
    pub fn resolve(self, x: &Array2<f64>) -> f64 {
        match self {
            Gamma::Value(g) => g,
            Gamma::Scale => {
                let var = match x.mean() {
                    Some(mean) => x.mapv(|v| (v - mean) * (v - mean)).mean().unwrap_or(0.0),
                    None => 0.0,
                };
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        }
    }
}

/// Solver and regularization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmConfig {
    /// Regularization parameter
    pub c: f64,
    /// Stopping tolerance on the maximal KKT violation
    pub tolerance: f64,
    /// Solver iteration cap
    pub max_iterations: usize,
    /// Scale `c` per class by `n / (2 · n_class)`
    pub balanced_class_weight: bool,
    /// Width of the RBF kernel; unused with a precomputed kernel
    pub gamma: Gamma,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tolerance: 1e-3,
            max_iterations: 100_000,
            balanced_class_weight: true,
            gamma: Gamma::Scale,
        }
    }
}

impl SvmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(ConfigError::invalid_parameter("svm.c", "must be positive and finite"));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(ConfigError::invalid_parameter("svm.tolerance", "must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid_parameter("svm.max_iterations", "must be at least 1"));
        }
        if let Gamma::Value(g) = self.gamma {
            if !(g > 0.0 && g.is_finite()) {
                return Err(ConfigError::invalid_parameter("svm.gamma", "must be positive"));
            }
        }
        Ok(())
    }
}

/// Kernel used by a classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvmKernel {
    /// Gaussian kernel on feature vectors
    Rbf,
    /// Inputs are Gram matrices: `n × n` to fit, `m × n` to predict
    Precomputed,
}

/// Sigmoid mapping decision values to fraud probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

impl PlattScaling {
    /// Fit `P(fraud | f) = 1 / (1 + exp(A·f + B))` by Newton's method with
    /// backtracking line search
    pub fn fit(decision: &[f64], y: &[f64]) -> Self {
        const MAX_ITER: usize = 100;
        const MIN_STEP: f64 = 1e-10;
        const SIGMA: f64 = 1e-12;
        const EPS: f64 = 1e-5;

        let prior1 = y.iter().filter(|&&v| v > 0.0).count() as f64;
        let prior0 = y.len() as f64 - prior1;

        let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
        let lo_target = 1.0 / (prior0 + 2.0);
        let targets: Vec<f64> = y
            .iter()
            .map(|&v| if v > 0.0 { hi_target } else { lo_target })
            .collect();

        let mut a = 0.0;
        let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
        let mut fval = platt_objective(decision, &targets, a, b);

        for _ in 0..MAX_ITER {
            let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);

            for (&f, &t) in decision.iter().zip(&targets) {
                let f_apb = f * a + b;
                let (p, q) = if f_apb >= 0.0 {
                    let e = (-f_apb).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = f_apb.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }

            if g1.abs() < EPS && g2.abs() < EPS {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let new_a = a + step * da;
                let new_b = b + step * db;
                let new_f = platt_objective(decision, &targets, new_a, new_b);
                if new_f < fval + 0.0001 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }

            if step < MIN_STEP {
                debug!("Platt line search stalled");
                break;
            }
        }

        Self { a, b }
    }

    /// Fraud probability for one decision value
    pub fn probability(&self, decision: f64) -> f64 {
        let f_apb = decision * self.a + self.b;
        if f_apb >= 0.0 {
            let e = (-f_apb).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + f_apb.exp())
        }
    }
}

fn platt_objective(decision: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    decision
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let f_apb = f * a + b;
            if f_apb >= 0.0 {
                t * f_apb + (-f_apb).exp().ln_1p()
            } else {
                (t - 1.0) * f_apb + f_apb.exp().ln_1p()
            }
        })
        .sum()
}

/// Parameters of a fitted model
#[derive(Debug, Clone)]
struct FittedSvm {
    /// Training rows, kept for the RBF kernel
    support: Option<Array2<f64>>,
    gamma: Option<f64>,
    /// `αᵢ · yᵢ` per training sample
    dual_coef: Array1<f64>,
    rho: f64,
    platt: PlattScaling,
    iterations: usize,
    converged: bool,
}

/// C-SVC with an RBF or precomputed kernel
#[derive(Debug, Clone)]
pub struct SupportVectorClassifier {
    kernel: SvmKernel,
    config: SvmConfig,
    fitted: Option<FittedSvm>,
}

impl SupportVectorClassifier {
    pub fn new(kernel: SvmKernel, config: SvmConfig) -> Self {
        Self {
            kernel,
            config,
            fitted: None,
        }
    }

    pub fn rbf(config: SvmConfig) -> Self {
        Self::new(SvmKernel::Rbf, config)
    }

    pub fn precomputed(config: SvmConfig) -> Self {
        Self::new(SvmKernel::Precomputed, config)
    }

    pub fn kernel(&self) -> SvmKernel {
        self.kernel
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Resolved RBF width, once fitted
    pub fn gamma(&self) -> Option<f64> {
        self.fitted.as_ref().and_then(|f| f.gamma)
    }

    /// Number of training samples with a non-zero dual coefficient
    pub fn support_vector_count(&self) -> usize {
        self.fitted
            .as_ref()
            .map_or(0, |f| f.dual_coef.iter().filter(|c| **c != 0.0).count())
    }

    /// Whether the solver met its tolerance before the iteration cap
    pub fn converged(&self) -> bool {
        self.fitted.as_ref().map_or(false, |f| f.converged)
    }

    pub fn iterations(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.iterations)
    }

    pub fn platt(&self) -> Option<PlattScaling> {
        self.fitted.as_ref().map(|f| f.platt)
    }

    /// Fit on feature rows (RBF) or on a square Gram matrix (precomputed)
    pub fn fit(&mut self, x: &Array2<f64>, labels: &[u8]) -> Result<(), ModelError> {
        let n = labels.len();
        if n == 0 || x.nrows() != n {
            return Err(ModelError::invalid_input(format!(
                "expected {} rows, got {}",
                n,
                x.nrows()
            )));
        }
        validate_labels(labels)?;
        if let Some(&first) = labels.first() {
            if labels.iter().all(|&l| l == first) {
                return Err(ModelError::SingleClass(first));
            }
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(match self.kernel {
                SvmKernel::Precomputed => ModelError::InvalidKernel("non-finite entry".to_string()),
                SvmKernel::Rbf => ModelError::invalid_input("non-finite feature value"),
            });
        }

        let (gram, support, gamma) = match self.kernel {
            SvmKernel::Precomputed => {
                if x.ncols() != n {
                    return Err(ModelError::InvalidKernel(format!(
                        "expected a {}x{} matrix, got {}x{}",
                        n,
                        n,
                        x.nrows(),
                        x.ncols()
                    )));
                }
                (x.clone(), None, None)
            }
            SvmKernel::Rbf => {
                let gamma = self.config.gamma.resolve(x);
                (rbf_gram(x, x, gamma), Some(x.clone()), Some(gamma))
            }
        };

        let y: Vec<f64> = labels.iter().map(|&l| if l == 1 { 1.0 } else { -1.0 }).collect();
        let bounds = self.class_bounds(labels);

        let solution = solve_smo(&gram, &y, &bounds, self.config.tolerance, self.config.max_iterations);
        if !solution.converged {
            warn!(iterations = solution.iterations, "SVM solver reached iteration limit");
        }

        let dual_coef: Array1<f64> = solution
            .alpha
            .iter()
            .zip(&y)
            .map(|(a, y)| a * y)
            .collect();

        let decision: Vec<f64> = (0..n)
            .map(|i| gram.row(i).dot(&dual_coef) - solution.rho)
            .collect();
        let platt = PlattScaling::fit(&decision, &y);

        debug!(
            kernel = ?self.kernel,
            samples = n,
            iterations = solution.iterations,
            support_vectors = dual_coef.iter().filter(|c| **c != 0.0).count(),
            rho = solution.rho,
            "SVM fitted"
        );

        self.fitted = Some(FittedSvm {
            support,
            gamma,
            dual_coef,
            rho: solution.rho,
            platt,
            iterations: solution.iterations,
            converged: solution.converged,
        });
        Ok(())
    }

    fn class_bounds(&self, labels: &[u8]) -> Vec<f64> {
        let n = labels.len() as f64;
        let fraud = labels.iter().filter(|&&l| l == 1).count() as f64;
        let genuine = n - fraud;
        let c = self.config.c;

        labels
            .iter()
            .map(|&l| {
                if !self.config.balanced_class_weight {
                    c
                } else if l == 1 {
                    c * n / (2.0 * fraud)
                } else {
                    c * n / (2.0 * genuine)
                }
            })
            .collect()
    }

    fn kernel_rows(&self, fitted: &FittedSvm, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        let n = fitted.dual_coef.len();
        match (self.kernel, &fitted.support, fitted.gamma) {
            (SvmKernel::Rbf, Some(support), Some(gamma)) => {
                if x.ncols() != support.ncols() {
                    return Err(ModelError::invalid_input(format!(
                        "expected {} features, got {}",
                        support.ncols(),
                        x.ncols()
                    )));
                }
                Ok(rbf_gram(x, support, gamma))
            }
            (SvmKernel::Precomputed, _, _) => {
                if x.ncols() != n {
                    return Err(ModelError::InvalidKernel(format!(
                        "expected {} columns, got {}",
                        n,
                        x.ncols()
                    )));
                }
                Ok(x.clone())
            }
            _ => Err(ModelError::NotFitted),
        }
    }
}

impl ProbabilisticClassifier for SupportVectorClassifier {
    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let k = self.kernel_rows(fitted, x)?;
        Ok(k.dot(&fitted.dual_coef) - fitted.rho)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let decision = self.decision_function(x)?;

        let mut proba = Array2::zeros((decision.len(), 2));
        for (mut row, &f) in proba.axis_iter_mut(Axis(0)).zip(decision.iter()) {
            let p = fitted.platt.probability(f);
            row[0] = 1.0 - p;
            row[1] = p;
        }
        Ok(proba)
    }

    fn name(&self) -> &'static str {
        match self.kernel {
            SvmKernel::Rbf => "svm-rbf",
            SvmKernel::Precomputed => "svm-precomputed",
        }
    }
}

/// `exp(-γ‖a − b‖²)` for every row pair of `a` and `b`
pub fn rbf_gram(a: &Array2<f64>, b: &Array2<f64>, gamma: f64) -> Array2<f64> {
    let mut k = Array2::zeros((a.nrows(), b.nrows()));
    for (i, ra) in a.outer_iter().enumerate() {
        for (j, rb) in b.outer_iter().enumerate() {
            k[[i, j]] = (-gamma * squared_distance(ra, rb)).exp();
        }
    }
    k
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

struct SmoSolution {
    alpha: Vec<f64>,
    rho: f64,
    iterations: usize,
    converged: bool,
}

fn solve_smo(k: &Array2<f64>, y: &[f64], c: &[f64], eps: f64, max_iterations: usize) -> SmoSolution {
    let n = y.len();
    let mut alpha = vec![0.0; n];
    // Gradient of the dual objective, Qα − e
    let mut grad = vec![-1.0; n];

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        let (i, j) = match select_working_set(k, y, c, &alpha, &grad, eps) {
            Some(pair) => pair,
            None => {
                converged = true;
                break;
            }
        };
        iterations += 1;

        let (old_ai, old_aj) = (alpha[i], alpha[j]);
        let quad = {
            let q = k[[i, i]] + k[[j, j]] - 2.0 * k[[i, j]];
            if q > 0.0 { q } else { TAU }
        };

        if y[i] != y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;

            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > c[i] - c[j] {
                if alpha[i] > c[i] {
                    alpha[i] = c[i];
                    alpha[j] = c[i] - diff;
                }
            } else if alpha[j] > c[j] {
                alpha[j] = c[j];
                alpha[i] = c[j] + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > c[i] {
                if alpha[i] > c[i] {
                    alpha[i] = c[i];
                    alpha[j] = sum - c[i];
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c[j] {
                if alpha[j] > c[j] {
                    alpha[j] = c[j];
                    alpha[i] = sum - c[j];
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let d_ai = alpha[i] - old_ai;
        let d_aj = alpha[j] - old_aj;
        for t in 0..n {
            grad[t] += y[t] * (y[i] * k[[i, t]] * d_ai + y[j] * k[[j, t]] * d_aj);
        }
    }

    let rho = compute_rho(y, c, &alpha, &grad);
    SmoSolution {
        alpha,
        rho,
        iterations,
        converged,
    }
}

fn at_upper(alpha: f64, c: f64) -> bool {
    alpha >= c
}

fn at_lower(alpha: f64) -> bool {
    alpha <= 0.0
}

/// Second-order working-set selection; `None` once the KKT gap is below `eps`
fn select_working_set(
    k: &Array2<f64>,
    y: &[f64],
    c: &[f64],
    alpha: &[f64],
    grad: &[f64],
    eps: f64,
) -> Option<(usize, usize)> {
    let n = y.len();

    let mut g_max = f64::NEG_INFINITY;
    let mut i_sel = None;
    for t in 0..n {
        let candidate = if y[t] > 0.0 {
            (!at_upper(alpha[t], c[t])).then(|| -grad[t])
        } else {
            (!at_lower(alpha[t])).then(|| grad[t])
        };
        if let Some(v) = candidate {
            if v >= g_max {
                g_max = v;
                i_sel = Some(t);
            }
        }
    }
    let i = i_sel?;

    let mut g_max2 = f64::NEG_INFINITY;
    let mut j_sel = None;
    let mut obj_diff_min = f64::INFINITY;

    for t in 0..n {
        let grad_diff = if y[t] > 0.0 {
            if at_lower(alpha[t]) {
                continue;
            }
            g_max2 = g_max2.max(grad[t]);
            g_max + grad[t]
        } else {
            if at_upper(alpha[t], c[t]) {
                continue;
            }
            g_max2 = g_max2.max(-grad[t]);
            g_max - grad[t]
        };

        if grad_diff > 0.0 {
            let quad = k[[i, i]] + k[[t, t]] - 2.0 * k[[i, t]];
            let obj_diff = if quad > 0.0 {
                -(grad_diff * grad_diff) / quad
            } else {
                -(grad_diff * grad_diff) / TAU
            };
            if obj_diff <= obj_diff_min {
                obj_diff_min = obj_diff;
                j_sel = Some(t);
            }
        }
    }

    if g_max + g_max2 < eps {
        return None;
    }
    j_sel.map(|j| (i, j))
}

fn compute_rho(y: &[f64], c: &[f64], alpha: &[f64], grad: &[f64]) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free_count = 0usize;

    for t in 0..y.len() {
        let yg = y[t] * grad[t];
        if at_upper(alpha[t], c[t]) {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if at_lower(alpha[t]) {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free_count += 1;
            free_sum += yg;
        }
    }

    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (upper + lower) / 2.0
    }
}

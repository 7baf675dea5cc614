//! Classification metrics

use ndarray::Array2;
use serde::Serialize;

use crate::error::ModelError;

/// Binary confusion counts, fraud as positive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (1, 1) => cm.true_positive += 1,
                (1, _) => cm.false_negative += 1,
                (_, 1) => cm.false_positive += 1,
                _ => cm.true_negative += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }
}

/// Summary scores for one model run
///
/// Precision, recall and F1 are averaged over both classes weighted by
/// their support in `y_true`; undefined ratios count as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// ROC AUC of the fraud probabilities; `None` for single-class truth
    pub auc: Option<f64>,
    /// Number of samples predicted as fraud
    pub fraud_detected: usize,
    /// Percentage of samples predicted as fraud
    pub fraud_rate: f64,
    pub confusion: ConfusionMatrix,
}

impl ClassificationMetrics {
    pub fn compute(y_true: &[u8], y_pred: &[u8], probabilities: &Array2<f64>) -> Result<Self, ModelError> {
        let n = y_true.len();
        if y_pred.len() != n || probabilities.nrows() != n || probabilities.ncols() != 2 {
            return Err(ModelError::invalid_input(format!(
                "{} labels, {} predictions, {}x{} probabilities",
                n,
                y_pred.len(),
                probabilities.nrows(),
                probabilities.ncols()
            )));
        }

        let confusion = ConfusionMatrix::from_labels(y_true, y_pred);
        let fraud_detected = y_pred.iter().filter(|&&p| p == 1).count();

        if n == 0 {
            return Ok(Self {
                accuracy: 0.0,
                precision: 0.0,
                recall: 0.0,
                f1: 0.0,
                auc: None,
                fraud_detected,
                fraud_rate: 0.0,
                confusion,
            });
        }

        let total = n as f64;
        let accuracy = (confusion.true_positive + confusion.true_negative) as f64 / total;

        // Per-class scores: (tp, fp, fn, support)
        let classes = [
            (
                confusion.true_negative,
                confusion.false_negative,
                confusion.false_positive,
                confusion.true_negative + confusion.false_positive,
            ),
            (
                confusion.true_positive,
                confusion.false_positive,
                confusion.false_negative,
                confusion.true_positive + confusion.false_negative,
            ),
        ];

        let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
        for (tp, fp, fn_, support) in classes {
            let weight = support as f64 / total;
            let p = ratio(tp, tp + fp);
            let r = ratio(tp, tp + fn_);
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
            precision += weight * p;
            recall += weight * r;
            f1 += weight * f;
        }

        let scores: Vec<f64> = probabilities.column(1).to_vec();

        Ok(Self {
            accuracy,
            precision,
            recall,
            f1,
            auc: roc_auc(y_true, &scores),
            fraud_detected,
            fraud_rate: fraud_detected as f64 / total * 100.0,
            confusion,
        })
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let positives = y_true.iter().filter(|&&l| l == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 || scores.len() != y_true.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based
        let avg = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = avg;
        }
        start = end + 1;
    }

    let positive_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(l, _)| **l == 1)
        .map(|(_, &r)| r)
        .sum();

    let p = positives as f64;
    let q = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * q))
}

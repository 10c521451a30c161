//! Binary classification metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Probabilities are clipped by this much before taking logs
const LOG_EPS: f64 = 1e-12;

/// Metrics for a probabilistic binary classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Accuracy at the 0.5 threshold
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// Area under the ROC curve, `None` when only one class is present
    pub auc_roc: Option<f64>,
    /// Mean binary cross-entropy
    pub log_loss: f64,
    pub n_samples: usize,
}

impl ClassificationMetrics {
    /// Compute metrics from labels in {0, 1} and predicted probabilities
    pub fn compute(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Self {
        let n = y_true.len();
        let (tp, fp, tn, fn_) = confusion_counts(y_true, y_prob);

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: ratio(tp + tn, n),
            precision,
            recall,
            f1_score,
            auc_roc: roc_auc(y_true, y_prob),
            log_loss: binary_cross_entropy(y_true, y_prob),
            n_samples: n,
        }
    }
}

/// Mean binary cross-entropy, 0.0 for empty input
pub fn binary_cross_entropy(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let total: f64 = y_true
        .iter()
        .zip(y_prob.iter())
        .map(|(&y, &p)| {
            let p = p.clamp(LOG_EPS, 1.0 - LOG_EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / y_true.len() as f64
}

/// Fraction of predictions on the right side of 0.5
pub fn accuracy(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let (tp, _, tn, _) = confusion_counts(y_true, y_prob);
    (tp + tn) as f64 / y_true.len() as f64
}

/// ROC AUC via the Mann-Whitney rank statistic, ties averaged
pub fn roc_auc(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Option<f64> {
    let n_pos = y_true.iter().filter(|&&y| y > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..y_prob.len()).collect();
    order.sort_by(|&a, &b| y_prob[a].total_cmp(&y_prob[b]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && y_prob[order[j + 1]] == y_prob[order[i]] {
            j += 1;
        }
        // ranks are 1-based; tied block [i, j] shares the mean rank
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if y_true[idx] > 0.5 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

fn confusion_counts(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> (usize, usize, usize, usize) {
    let mut tp = 0;
    let mut fp = 0;
    let mut tn = 0;
    let mut fn_ = 0;

    for (&y, &p) in y_true.iter().zip(y_prob.iter()) {
        match (y > 0.5, p > 0.5) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    (tp, fp, tn, fn_)
}

//! Metric based early stopping

use serde::{Deserialize, Serialize};

/// Metric watched by early stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoppingMetric {
    /// Whatever primary loss the artifact reports; lower is better
    #[default]
    Auto,
    Deviance,
    Logloss,
    Mse,
    Rmse,
    Mae,
    Rmsle,
    Auc,
    Aucpr,
    MisclassificationRate,
    MeanPerClassError,
    R2,
}

impl StoppingMetric {
    /// Whether larger values are improvements
    pub fn more_is_better(&self) -> bool {
        matches!(self, StoppingMetric::Auc | StoppingMetric::Aucpr | StoppingMetric::R2)
    }
}

/// Early stopping over the trailing scores of successfully built models.
///
/// Disabled when `stopping_rounds` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStopping {
    pub stopping_rounds: usize,
    pub stopping_metric: StoppingMetric,
    pub stopping_tolerance: f64,
}

impl Default for EarlyStopping {
    fn default() -> Self {
        Self {
            stopping_rounds: 0,
            stopping_metric: StoppingMetric::Auto,
            stopping_tolerance: 1e-3,
        }
    }
}

impl EarlyStopping {
    pub fn new(stopping_rounds: usize, stopping_metric: StoppingMetric, stopping_tolerance: f64) -> Self {
        Self {
            stopping_rounds,
            stopping_metric,
            stopping_tolerance,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.stopping_rounds > 0
    }

    /// Evaluate the stopping rule against scores in build order
    pub fn should_stop(&self, scores: &[f64]) -> bool {
        stop_early(
            scores,
            self.stopping_rounds,
            self.stopping_tolerance,
            self.stopping_metric.more_is_better(),
        )
    }
}

/// Moving-average convergence test.
///
/// Takes the last `2k` scores and computes `k + 1` simple moving averages
/// of width `k`. The first average is the reference; the search has
/// converged when none of the following `k` averages improves on it by a
/// relative margin of more than `tolerance`.
pub fn stop_early(scores: &[f64], k: usize, tolerance: f64, more_is_better: bool) -> bool {
    if k == 0 || scores.len() < 2 * k {
        return false;
    }

    let start = scores.len() - 2 * k;
    let averages: Vec<f64> = (0..=k)
        .map(|i| {
            let window = &scores[start + i..start + i + k];
            window.iter().sum::<f64>() / k as f64
        })
        .collect();

    let reference = averages[0];
    let recent = &averages[1..];

    let max = averages.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let min = averages.iter().cloned().fold(f64::INFINITY, f64::min);
    // Zero crossing (e.g. residual deviance, r2): relative change is meaningless
    if sign(max) != sign(min) || reference == 0.0 {
        return false;
    }

    let best = if more_is_better {
        recent.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    } else {
        recent.iter().cloned().fold(f64::INFINITY, f64::min)
    };
    let ratio = best / reference;
    if ratio.is_nan() {
        return false;
    }

    // Dividing two negatives flips the direction of improvement
    let improved = if more_is_better == (reference > 0.0) {
        ratio > 1.0 + tolerance
    } else {
        ratio < 1.0 - tolerance
    };
    !improved
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

//! Search criteria
//!
//! Stopping policies for a grid search:
//! - Cartesian: walk the whole space, stop at exhaustion
//! - RandomDiscrete: seeded sampling bounded by model count and runtime
//! - Sequential: explicit points with optional metric based early stopping

mod stopping;

pub use stopping::{stop_early, EarlyStopping, StoppingMetric};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why a search stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The walker ran out of points
    Exhausted,
    MaxModels,
    MaxRuntime,
    EarlyStopping,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Exhausted => "hyperspace exhausted",
            StopReason::MaxModels => "max_models reached",
            StopReason::MaxRuntime => "max runtime reached",
            StopReason::EarlyStopping => "early stopping",
            StopReason::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Counters the orchestrator feeds into the stopping policy
#[derive(Debug, Clone, Default)]
pub struct SearchProgress {
    pub elapsed: Duration,
    /// Points that produced a model in this session, cache hits included
    pub models_built: usize,
    /// Scores of those models in build order
    pub scores: Vec<f64>,
}

/// Random sampling budget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomDiscreteCriteria {
    /// Seed of the sampler; `None` draws one from the OS
    pub seed: Option<u64>,
    /// 0 means unlimited
    pub max_models: usize,
    /// 0 means unlimited
    pub max_runtime_ms: u64,
    pub early_stopping: Option<EarlyStopping>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequentialCriteria {
    /// 0 means unlimited
    pub max_models: usize,
    /// 0 means unlimited
    pub max_runtime_ms: u64,
    pub early_stopping: Option<EarlyStopping>,
}

/// Stopping policy of a grid search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SearchCriteria {
    #[default]
    Cartesian,
    RandomDiscrete(RandomDiscreteCriteria),
    Sequential(SequentialCriteria),
}

impl SearchCriteria {
    pub fn cartesian() -> Self {
        SearchCriteria::Cartesian
    }

    pub fn random_discrete(seed: u64) -> Self {
        SearchCriteria::RandomDiscrete(RandomDiscreteCriteria {
            seed: Some(seed),
            ..Default::default()
        })
    }

    pub fn sequential() -> Self {
        SearchCriteria::Sequential(SequentialCriteria::default())
    }

    /// Set the model budget (ignored by cartesian search)
    pub fn with_max_models(mut self, max_models: usize) -> Self {
        match &mut self {
            SearchCriteria::Cartesian => {}
            SearchCriteria::RandomDiscrete(c) => c.max_models = max_models,
            SearchCriteria::Sequential(c) => c.max_models = max_models,
        }
        self
    }

    /// Set the runtime budget (ignored by cartesian search)
    pub fn with_max_runtime_ms(mut self, max_runtime_ms: u64) -> Self {
        match &mut self {
            SearchCriteria::Cartesian => {}
            SearchCriteria::RandomDiscrete(c) => c.max_runtime_ms = max_runtime_ms,
            SearchCriteria::Sequential(c) => c.max_runtime_ms = max_runtime_ms,
        }
        self
    }

    /// Enable early stopping (ignored by cartesian search)
    pub fn with_early_stopping(mut self, early_stopping: EarlyStopping) -> Self {
        match &mut self {
            SearchCriteria::Cartesian => {}
            SearchCriteria::RandomDiscrete(c) => c.early_stopping = Some(early_stopping),
            SearchCriteria::Sequential(c) => c.early_stopping = Some(early_stopping),
        }
        self
    }

    pub fn strategy(&self) -> &'static str {
        match self {
            SearchCriteria::Cartesian => "cartesian",
            SearchCriteria::RandomDiscrete(_) => "random_discrete",
            SearchCriteria::Sequential(_) => "sequential",
        }
    }

    /// Model budget, 0 when unlimited
    pub fn max_models(&self) -> usize {
        match self {
            SearchCriteria::Cartesian => 0,
            SearchCriteria::RandomDiscrete(c) => c.max_models,
            SearchCriteria::Sequential(c) => c.max_models,
        }
    }

    /// Runtime budget, `None` when unlimited
    pub fn max_runtime(&self) -> Option<Duration> {
        let ms = match self {
            SearchCriteria::Cartesian => 0,
            SearchCriteria::RandomDiscrete(c) => c.max_runtime_ms,
            SearchCriteria::Sequential(c) => c.max_runtime_ms,
        };
        (ms > 0).then(|| Duration::from_millis(ms))
    }

    /// Active early stopping rule, if any
    pub fn early_stopping(&self) -> Option<&EarlyStopping> {
        match self {
            SearchCriteria::Cartesian => None,
            SearchCriteria::RandomDiscrete(c) => c.early_stopping.as_ref(),
            SearchCriteria::Sequential(c) => c.early_stopping.as_ref(),
        }
        .filter(|es| es.is_enabled())
    }

    /// Time left of the runtime budget, `None` when unlimited
    pub fn remaining_runtime(&self, elapsed: Duration) -> Option<Duration> {
        self.max_runtime()
            .map(|limit| limit.saturating_sub(elapsed))
    }

    /// Evaluate the policy after a point has been processed
    pub fn should_stop(&self, progress: &SearchProgress) -> Option<StopReason> {
        let max_models = self.max_models();
        if max_models > 0 && progress.models_built >= max_models {
            return Some(StopReason::MaxModels);
        }
        if let Some(limit) = self.max_runtime() {
            if progress.elapsed >= limit {
                return Some(StopReason::MaxRuntime);
            }
        }
        match self.early_stopping() {
            Some(es) if es.should_stop(&progress.scores) => Some(StopReason::EarlyStopping),
            _ => None,
        }
    }
}

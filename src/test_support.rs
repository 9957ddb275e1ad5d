//! Configuration type and fake trainer shared by unit tests

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::criteria::StoppingMetric;
use crate::error::{GridError, Result};
use crate::params::{FieldTable, ModelParameters};
use crate::registry::ModelKey;
use crate::search::{BuildContext, ModelArtifact, ModelBuilder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub ntrees: usize,
    pub max_depth: usize,
    pub min_rows: f64,
    pub learn_rate: f64,
    pub sample_rate: f64,
    pub distribution: String,
    pub seed: i64,
    pub max_runtime_secs: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            ntrees: 50,
            max_depth: 5,
            min_rows: 10.0,
            learn_rate: 0.1,
            sample_rate: 1.0,
            distribution: "auto".to_string(),
            seed: -1,
            max_runtime_secs: 0.0,
        }
    }
}

impl ModelParameters for TreeParams {
    fn algo_name(&self) -> &str {
        "gbm"
    }

    fn fields() -> FieldTable<Self> {
        FieldTable::<Self>::new()
            .field("ntrees", |p| p.ntrees.into(), |p, v| {
                p.ntrees = v.as_usize("ntrees")?;
                Ok(())
            })
            .field("max_depth", |p| p.max_depth.into(), |p, v| {
                p.max_depth = v.as_usize("max_depth")?;
                Ok(())
            })
            .field("min_rows", |p| p.min_rows.into(), |p, v| {
                p.min_rows = v.as_f64("min_rows")?;
                Ok(())
            })
            .field("learn_rate", |p| p.learn_rate.into(), |p, v| {
                p.learn_rate = v.as_f64("learn_rate")?;
                Ok(())
            })
            .field("sample_rate", |p| p.sample_rate.into(), |p, v| {
                p.sample_rate = v.as_f64("sample_rate")?;
                Ok(())
            })
            .field("distribution", |p| p.distribution.as_str().into(), |p, v| {
                p.distribution = v.as_str("distribution")?.to_string();
                Ok(())
            })
            .field("seed", |p| p.seed.into(), |p, v| {
                p.seed = v.as_i64("seed")?;
                Ok(())
            })
            .field("max_runtime_secs", |p| p.max_runtime_secs.into(), |p, v| {
                p.max_runtime_secs = v.as_f64("max_runtime_secs")?;
                Ok(())
            })
    }

    fn seed_field() -> Option<&'static str> {
        Some("seed")
    }
}

#[derive(Debug)]
pub struct FakeModel {
    pub key: ModelKey,
    pub score: f64,
}

impl ModelArtifact for FakeModel {
    fn key(&self) -> &ModelKey {
        &self.key
    }

    fn score(&self, _metric: StoppingMetric) -> Option<f64> {
        Some(self.score)
    }
}

/// Scores a configuration by its tree count. Configurations with
/// `max_depth == fail_depth` fail, `max_depth == panic_depth` panic.
#[derive(Debug, Default, Clone)]
pub struct FakeBuilder {
    pub calls: Arc<AtomicUsize>,
    pub fail_depth: Option<usize>,
    pub panic_depth: Option<usize>,
    /// Cancel the session from inside the n-th build
    pub cancel_on_call: Option<usize>,
}

impl FakeBuilder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelBuilder<TreeParams> for FakeBuilder {
    type Artifact = FakeModel;

    fn build(&self, params: &TreeParams, ctx: &BuildContext) -> Result<FakeModel> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_on_call == Some(call) {
            ctx.cancel.cancel();
        }
        if self.panic_depth == Some(params.max_depth) {
            panic!("tree builder crashed");
        }
        if self.fail_depth == Some(params.max_depth) {
            return Err(GridError::Build(format!(
                "max_depth {} is not supported",
                params.max_depth
            )));
        }
        Ok(FakeModel {
            key: ctx.model_key.clone(),
            score: params.ntrees as f64,
        })
    }
}

//! Shared fixtures: a small tree-ensemble configuration and a fake trainer

#![allow(dead_code)]

use kolosal_grid::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    pub ntrees: usize,
    pub max_depth: usize,
    pub learn_rate: f64,
    pub col_sample_rate: f64,
    pub histogram_type: String,
    pub max_runtime_secs: f64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            ntrees: 50,
            max_depth: 5,
            learn_rate: 0.1,
            col_sample_rate: 1.0,
            histogram_type: "auto".to_string(),
            max_runtime_secs: 0.0,
        }
    }
}

impl ModelParameters for GbmParams {
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
            .field("learn_rate", |p| p.learn_rate.into(), |p, v| {
                p.learn_rate = v.as_f64("learn_rate")?;
                Ok(())
            })
            .field("col_sample_rate", |p| p.col_sample_rate.into(), |p, v| {
                p.col_sample_rate = v.as_f64("col_sample_rate")?;
                Ok(())
            })
            .field("histogram_type", |p| p.histogram_type.as_str().into(), |p, v| {
                p.histogram_type = v.as_str("histogram_type")?.to_string();
                Ok(())
            })
            .field("max_runtime_secs", |p| p.max_runtime_secs.into(), |p, v| {
                p.max_runtime_secs = v.as_f64("max_runtime_secs")?;
                Ok(())
            })
    }
}

#[derive(Debug)]
pub struct GbmModel {
    pub key: ModelKey,
    pub params: GbmParams,
    pub score: f64,
}

impl ModelArtifact for GbmModel {
    fn key(&self) -> &ModelKey {
        &self.key
    }

    fn score(&self, _metric: StoppingMetric) -> Option<f64> {
        Some(self.score)
    }
}

/// Records every configuration it is asked to build
#[derive(Debug, Clone, Default)]
pub struct GbmBuilder {
    pub calls: Arc<AtomicUsize>,
    pub built: Arc<parking_lot::Mutex<Vec<GbmParams>>>,
    /// Builds with this depth fail
    pub fail_depth: Option<usize>,
    /// Request cancellation from inside the n-th build
    pub cancel_on_call: Option<usize>,
    /// Every model gets this score instead of `ntrees * learn_rate`
    pub constant_score: Option<f64>,
}

impl GbmBuilder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn built(&self) -> Vec<GbmParams> {
        self.built.lock().clone()
    }
}

impl ModelBuilder<GbmParams> for GbmBuilder {
    type Artifact = GbmModel;

    fn build(&self, params: &GbmParams, ctx: &BuildContext) -> kolosal_grid::Result<GbmModel> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_on_call == Some(call) {
            ctx.cancel.cancel();
        }
        if self.fail_depth == Some(params.max_depth) {
            return Err(GridError::Build(format!(
                "tree depth {} exceeds the column budget",
                params.max_depth
            )));
        }
        self.built.lock().push(params.clone());
        Ok(GbmModel {
            key: ctx.model_key.clone(),
            params: params.clone(),
            score: self
                .constant_score
                .unwrap_or(params.ntrees as f64 * params.learn_rate),
        })
    }
}

pub fn ints(point: &RawPoint, name: &str) -> i64 {
    match point.get(name) {
        Some(HyperValue::Int(v)) => *v,
        other => panic!("{} is not an int: {:?}", name, other),
    }
}

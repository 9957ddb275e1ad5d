//! Grid Search Example
//!
//! Runs a cartesian search over a toy gradient boosting configuration,
//! then extends the same grid with more candidates. Already built
//! configurations are answered from the grid's result cache.

use kolosal_grid::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct BoostingParams {
    ntrees: usize,
    max_depth: usize,
    learn_rate: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            ntrees: 50,
            max_depth: 5,
            learn_rate: 0.1,
        }
    }
}

impl ModelParameters for BoostingParams {
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
    }
}

struct ToyModel {
    key: ModelKey,
    logloss: f64,
}

impl ModelArtifact for ToyModel {
    fn key(&self) -> &ModelKey {
        &self.key
    }

    fn score(&self, _metric: StoppingMetric) -> Option<f64> {
        Some(self.logloss)
    }
}

/// Stands in for a real trainer: the loss is a smooth function of the
/// configuration with a minimum near 200 trees, depth 6, rate 0.05
struct ToyTrainer;

impl ModelBuilder<BoostingParams> for ToyTrainer {
    type Artifact = ToyModel;

    fn build(&self, params: &BoostingParams, ctx: &BuildContext) -> kolosal_grid::Result<ToyModel> {
        if params.max_depth > 12 {
            return Err(GridError::Build(format!(
                "max_depth {} does not fit in memory",
                params.max_depth
            )));
        }
        let trees = (params.ntrees as f64 / 200.0).ln().powi(2);
        let depth = (params.max_depth as f64 - 6.0).powi(2) / 36.0;
        let rate = ((params.learn_rate - 0.05) * 10.0).powi(2);
        Ok(ToyModel {
            key: ctx.model_key.clone(),
            logloss: 0.3 + 0.1 * (trees + depth + rate),
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_grid=info".into()),
        )
        .init();

    let dir = tempfile::tempdir()?;
    let store: Arc<dyn GridStore> = Arc::new(FileGridStore::open(dir.path())?);

    let space = HyperSpace::new()
        .with_param("ntrees", [50, 100, 200])
        .with_param("max_depth", [4, 6, 16])
        .with_param("learn_rate", [0.1, 0.05]);
    println!("Hyperparameter space: {} points\n", space.size());

    let walker = create_walker(
        BoostingParams::default(),
        space,
        SearchCriteria::cartesian(),
        FieldNaming::Consistent,
    )?;
    let outcome = GridSearch::new(walker, ToyTrainer)
        .with_grid_key("gbm_demo")
        .with_store(Arc::clone(&store))
        .with_origin("synthetic-frame")
        .run()?;
    report(&outcome);

    // Extend the grid: only the new ntrees candidate is trained
    let wider = HyperSpace::new()
        .with_param("ntrees", [50, 100, 200, 400])
        .with_param("max_depth", [4, 6, 16])
        .with_param("learn_rate", [0.1, 0.05]);
    let walker = create_walker(
        BoostingParams::default(),
        wider,
        SearchCriteria::cartesian(),
        FieldNaming::Consistent,
    )?;
    let outcome = GridSearch::new(walker, ToyTrainer)
        .with_grid_key("gbm_demo")
        .with_store(Arc::clone(&store))
        .with_origin("synthetic-frame")
        .run()?;
    report(&outcome);

    Ok(())
}

fn report(outcome: &SearchOutcome<BoostingParams>) {
    println!("Search {} ({})", outcome.state, outcome.stop_reason);
    println!(
        "  points: {}, builds: {}, cache hits: {}",
        outcome.points_processed, outcome.builds, outcome.cache_hits
    );
    println!(
        "  models: {}, failures: {}",
        outcome.grid.model_count(),
        outcome.grid.failure_count()
    );
    let best = outcome
        .grid
        .cache()
        .iter()
        .filter_map(|entry| entry.score.map(|s| (s, &entry.model_key)))
        .min_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((score, key)) = best {
        println!("  best model: {} (logloss {:.4})", key, score);
    }
    for failure in outcome.grid.failures() {
        println!("  failed: {:?} -> {}", failure.raw, failure.error);
    }
    println!();
}

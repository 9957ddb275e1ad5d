//! Filtered Random Search Example
//!
//! Samples a space at random, skipping combinations a filter marks as
//! invalid, stops once the loss stops improving and runs the search on a
//! background thread while polling its progress.

use kolosal_grid::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct NetParams {
    hidden: Vec<i64>,
    epochs: usize,
    rate: f64,
    dropout: f64,
    seed: i64,
}

impl Default for NetParams {
    fn default() -> Self {
        Self {
            hidden: vec![200, 200],
            epochs: 10,
            rate: 0.005,
            dropout: 0.0,
            seed: -1,
        }
    }
}

impl ModelParameters for NetParams {
    fn algo_name(&self) -> &str {
        "deeplearning"
    }

    fn fields() -> FieldTable<Self> {
        FieldTable::<Self>::new()
            .field("hidden", |p| p.hidden.clone().into(), |p, v| {
                p.hidden = v.as_int_list("hidden")?;
                Ok(())
            })
            .field("epochs", |p| p.epochs.into(), |p, v| {
                p.epochs = v.as_usize("epochs")?;
                Ok(())
            })
            .field("rate", |p| p.rate.into(), |p, v| {
                p.rate = v.as_f64("rate")?;
                Ok(())
            })
            .field("dropout", |p| p.dropout.into(), |p, v| {
                p.dropout = v.as_f64("dropout")?;
                Ok(())
            })
            .field("seed", |p| p.seed.into(), |p, v| {
                p.seed = v.as_i64("seed")?;
                Ok(())
            })
    }

    // Each sampled model trains with seed 42, 43, ...
    fn seed_field() -> Option<&'static str> {
        Some("seed")
    }
}

struct ToyNet {
    key: ModelKey,
    mse: f64,
}

impl ModelArtifact for ToyNet {
    fn key(&self) -> &ModelKey {
        &self.key
    }

    fn score(&self, _metric: StoppingMetric) -> Option<f64> {
        Some(self.mse)
    }
}

struct ToyNetTrainer;

impl ModelBuilder<NetParams> for ToyNetTrainer {
    type Artifact = ToyNet;

    fn build(&self, params: &NetParams, ctx: &BuildContext) -> kolosal_grid::Result<ToyNet> {
        if ctx.is_cancelled() {
            return Err(GridError::Cancelled);
        }
        std::thread::sleep(Duration::from_millis(20));
        let width: i64 = params.hidden.iter().sum();
        let capacity = (width as f64 / 400.0 - 1.0).powi(2);
        let training = 1.0 / params.epochs as f64 + (params.rate * 100.0 - 0.5).abs();
        let noise = params.seed.rem_euclid(7) as f64 * 1e-3;
        Ok(ToyNet {
            key: ctx.model_key.clone(),
            mse: 1.0 + capacity + training + params.dropout + noise,
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

    let space = HyperSpace::from_json_str(
        r#"{
            "hidden": [[100], [200, 200], [400, 400], [800, 800, 800]],
            "epochs": [5, 10, 20, 40],
            "rate": [0.001, 0.005, 0.01],
            "dropout": [0.0, 0.1, 0.5]
        }"#,
    )?;
    println!("Hyperparameter space: {} points", space.size());

    let criteria = SearchCriteria::random_discrete(42)
        .with_max_models(25)
        .with_max_runtime_ms(30_000)
        .with_early_stopping(EarlyStopping::new(3, StoppingMetric::Mse, 1e-3));
    let walker = create_walker(NetParams::default(), space, criteria, FieldNaming::Consistent)?;

    // Wide three-layer nets with heavy dropout never converge in 5 epochs
    let filter = AnyMatchFilter::new()
        .with_function(|p| {
            !(matches!(p.get("hidden"), Some(HyperValue::IntList(h)) if h.len() == 3)
                && p.get("dropout") == Some(&HyperValue::Float(0.5)))
        })
        .with_function(|p| p.get("epochs") != Some(&HyperValue::Int(5)));
    let walker = FilteredWalker::new(walker, filter);

    let mut job = GridSearch::new(walker, ToyNetTrainer)
        .with_grid_key("dl_random")
        .start()?;

    let outcome = loop {
        if let Some(outcome) = job.wait_timeout(Duration::from_millis(100)) {
            break outcome?;
        }
        println!("  {} points done", job.progress().done());
    };

    println!(
        "\nSearch {} ({}) after {:?}",
        outcome.state, outcome.stop_reason, outcome.elapsed
    );
    println!(
        "Models: {}, points: {}",
        outcome.grid.model_count(),
        outcome.points_processed
    );
    Ok(())
}

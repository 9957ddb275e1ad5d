//! Randomized walker: seeded sampling without replacement

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{HyperSpaceIterator, HyperSpaceWalker, WalkerCore};
use crate::criteria::SearchCriteria;
use crate::error::{GridError, Result};
use crate::params::{FieldNaming, ModelParameters, ParamsBuilder};
use crate::space::{HyperSpace, RawPoint, SpaceLayout};

/// Lower bound on draws without a fresh point before giving up
const MIN_SAMPLING_ATTEMPTS: u64 = 10_000;

/// Samples points uniformly at random, never visiting a point twice.
///
/// The sequence depends only on the seed and the space: every iterator
/// restarts the generator from the seed, and failures never consume
/// random numbers.
///
/// With an explicit search seed and a base configuration that leaves its
/// [`ModelParameters::seed_field`] at the default, the n-th point (counting
/// from 0) trains with seed `search_seed + n`.
#[derive(Debug, Clone)]
pub struct RandomWalker<P> {
    core: WalkerCore<P>,
    layouts: Arc<[SpaceLayout]>,
    size: u64,
    seed: u64,
    model_seed: Option<i64>,
}

impl<P: ModelParameters> RandomWalker<P> {
    pub fn new(
        base: P,
        space: HyperSpace,
        criteria: SearchCriteria,
        naming: FieldNaming,
    ) -> Result<Self> {
        let configured = match &criteria {
            SearchCriteria::RandomDiscrete(c) => c.seed,
            other => {
                return Err(GridError::SpaceConstruction(format!(
                    "Random walker cannot run {} search",
                    other.strategy()
                )))
            }
        };
        space.validate()?;
        let core = WalkerCore::new(base, space.names(), criteria, naming)?;
        let model_seed = configured
            .filter(|_| base_seed_is_default(&core))
            .map(|seed| seed as i64);
        Ok(Self {
            core,
            layouts: space.layouts().into(),
            size: space.size(),
            seed: configured.unwrap_or_else(rand::random),
            model_seed,
        })
    }

    /// Seed in use, drawn from the OS when none was configured
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed of the first model, when the walker assigns model seeds
    pub fn model_seed(&self) -> Option<i64> {
        self.model_seed
    }

    fn start(&self, max_models: usize) -> RandomIterator {
        let it = RandomIterator::new(
            Arc::clone(&self.layouts),
            self.seed,
            max_models,
            self.core.criteria.max_runtime(),
        );
        match self.model_seed {
            Some(first) => it.with_model_seeds(first),
            None => it,
        }
    }
}

fn base_seed_is_default<P: ModelParameters>(core: &WalkerCore<P>) -> bool {
    P::seed_field()
        .and_then(|name| core.builder.fields().get(name))
        .map(|field| field.read(&core.base) == field.read(&P::default()))
        .unwrap_or(false)
}

impl<P: ModelParameters> HyperSpaceWalker<P> for RandomWalker<P> {
    fn iterator(&self) -> Box<dyn HyperSpaceIterator> {
        Box::new(self.start(self.core.criteria.max_models()))
    }

    fn unbounded_iterator(&self) -> Box<dyn HyperSpaceIterator> {
        Box::new(self.start(0))
    }

    fn hyper_space_size(&self) -> u64 {
        self.size
    }

    fn hyper_param_names(&self) -> &[String] {
        &self.core.names
    }

    fn base_params(&self) -> &P {
        &self.core.base
    }

    fn params_builder(&self) -> &ParamsBuilder<P> {
        &self.core.builder
    }

    fn search_criteria(&self) -> &SearchCriteria {
        &self.core.criteria
    }
}

/// Iterator state of a random walk
#[derive(Debug, Clone)]
pub struct RandomIterator {
    layouts: Arc<[SpaceLayout]>,
    sizes: Vec<u64>,
    total: u64,
    rng: ChaCha8Rng,
    seen: HashSet<(usize, Vec<usize>)>,
    current: Option<RawPoint>,
    visited: usize,
    used: usize,
    max_models: usize,
    started: Instant,
    max_runtime: Option<Duration>,
    exhausted: bool,
    model_seed: Option<i64>,
}

impl RandomIterator {
    pub fn new(
        layouts: Arc<[SpaceLayout]>,
        seed: u64,
        max_models: usize,
        max_runtime: Option<Duration>,
    ) -> Self {
        let sizes: Vec<u64> = layouts.iter().map(SpaceLayout::size).collect();
        let total = sizes.iter().fold(0u64, |acc, s| acc.saturating_add(*s));
        Self {
            layouts,
            sizes,
            total,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seen: HashSet::new(),
            current: None,
            visited: 0,
            used: 0,
            max_models,
            started: Instant::now(),
            max_runtime,
            exhausted: false,
            model_seed: None,
        }
    }

    /// Stamp the n-th point handed out with model seed `first + n`
    pub fn with_model_seeds(mut self, first: i64) -> Self {
        self.model_seed = Some(first);
        self
    }

    /// Draw a layout weighted by its size, then every digit independently
    fn sample(&mut self) -> (usize, Vec<usize>) {
        let mut pick = self.rng.gen_range(0..self.total);
        let mut layout_idx = 0;
        for (idx, size) in self.sizes.iter().enumerate() {
            if pick < *size {
                layout_idx = idx;
                break;
            }
            pick -= size;
        }
        let digits = self.layouts[layout_idx]
            .radices()
            .into_iter()
            .map(|radix| self.rng.gen_range(0..radix))
            .collect();
        (layout_idx, digits)
    }

    fn out_of_time(&self) -> bool {
        self.max_runtime
            .map(|limit| self.started.elapsed() >= limit)
            .unwrap_or(false)
    }
}

impl HyperSpaceIterator for RandomIterator {
    fn has_next(&self) -> bool {
        !self.exhausted
            && (self.visited as u64) < self.total
            && (self.max_models == 0 || self.used < self.max_models)
            && !self.out_of_time()
    }

    fn next_point(&mut self) -> Option<RawPoint> {
        if !self.has_next() {
            return None;
        }
        let attempts = MIN_SAMPLING_ATTEMPTS.max(self.total);
        for _ in 0..attempts {
            let (layout_idx, digits) = self.sample();
            let mut point = self.layouts[layout_idx].point(&digits);
            if self.seen.insert((layout_idx, digits)) {
                if let Some(first) = self.model_seed {
                    point = point.with_model_seed(first.wrapping_add(self.visited as i64));
                }
                self.visited += 1;
                self.used += 1;
                self.current = Some(point.clone());
                return Some(point);
            }
        }
        tracing::debug!(visited = self.visited, "Random walk gave up looking for unseen points");
        self.exhausted = true;
        None
    }

    fn on_failure(&mut self, _point: &RawPoint) {
        self.used = self.used.saturating_sub(1);
    }

    fn current_raw_parameters(&self) -> Option<RawPoint> {
        self.current.clone()
    }

    fn visited(&self) -> usize {
        self.visited
    }
}

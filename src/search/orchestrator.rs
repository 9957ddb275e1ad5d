//! Grid search orchestrator
//!
//! Drives one walker through a sequential build loop:
//! cancel check, next point, configuration, fingerprint, cache lookup or
//! build, progress, checkpoint, stop check.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::builder::{BuildContext, ModelArtifact, ModelBuilder};
use super::config::GridSearchConfig;
use super::job::{CancellationToken, Progress, SearchJob};
use crate::criteria::{SearchProgress, StopReason, StoppingMetric};
use crate::error::{GridError, Result};
use crate::fingerprint::{FieldFingerprinter, Fingerprinter};
use crate::params::ModelParameters;
use crate::registry::{FailureKind, Grid, GridLock, GridStore, InMemoryGridStore};
use crate::space::RawPoint;
use crate::walker::HyperSpaceWalker;

/// Lifecycle of a search session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchState {
    Initializing,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl SearchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchState::Completed | SearchState::Cancelled | SearchState::Failed
        )
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchState::Initializing => "initializing",
            SearchState::Running => "running",
            SearchState::Completed => "completed",
            SearchState::Cancelled => "cancelled",
            SearchState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Result of a search that did not fail
#[derive(Debug, Clone)]
pub struct SearchOutcome<P> {
    /// `Completed` or `Cancelled`
    pub state: SearchState,
    pub stop_reason: StopReason,
    /// Grid record as persisted at the end of the session
    pub grid: Grid<P>,
    /// Points consumed in this session
    pub points_processed: usize,
    /// Points answered from the result cache
    pub cache_hits: usize,
    /// Build calls made
    pub builds: usize,
    pub elapsed: Duration,
}

impl<P> SearchOutcome<P> {
    pub fn is_cancelled(&self) -> bool {
        self.state == SearchState::Cancelled
    }
}

/// Per session counters
#[derive(Debug, Default)]
struct Session {
    points_processed: usize,
    cache_hits: usize,
    builds: usize,
    consecutive_failures: usize,
    progress: SearchProgress,
}

impl Session {
    fn record_model(&mut self, score: Option<f64>) {
        self.consecutive_failures = 0;
        self.progress.models_built += 1;
        if let Some(score) = score {
            self.progress.scores.push(score);
        }
    }

    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }
}

/// What happened to a single point
enum PointResult {
    Model,
    Failed,
}

/// A grid search over one walker, one builder and one grid record.
///
/// ```ignore
/// let search = GridSearch::new(walker, builder)
///     .with_grid_key("gbm_grid")
///     .with_store(store)
///     .with_origin("train.csv");
/// let outcome = search.run()?;
/// ```
pub struct GridSearch<P, W, B> {
    walker: W,
    builder: B,
    store: Arc<dyn GridStore>,
    fingerprinter: Arc<dyn Fingerprinter<P>>,
    grid_key: String,
    origin: Option<String>,
    config: GridSearchConfig,
    cancel: CancellationToken,
    progress: Progress,
    state: Arc<Mutex<SearchState>>,
}

impl<P, W, B> GridSearch<P, W, B>
where
    P: ModelParameters,
    W: HyperSpaceWalker<P>,
    B: ModelBuilder<P>,
{
    pub fn new(walker: W, builder: B) -> Self {
        let grid_key = format!(
            "Grid_{}_{}",
            walker.base_params().algo_name(),
            Uuid::new_v4().simple()
        );
        Self {
            walker,
            builder,
            store: Arc::new(InMemoryGridStore::new()),
            fingerprinter: Arc::new(FieldFingerprinter::<P>::new()),
            grid_key,
            origin: None,
            config: GridSearchConfig::default(),
            cancel: CancellationToken::new(),
            progress: Progress::new(),
            state: Arc::new(Mutex::new(SearchState::Initializing)),
        }
    }

    /// Append to (or create) the grid stored under `key`
    pub fn with_grid_key(mut self, key: impl Into<String>) -> Self {
        self.grid_key = key.into();
        self
    }

    pub fn with_store(mut self, store: Arc<dyn GridStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_fingerprinter(mut self, fingerprinter: impl Fingerprinter<P> + 'static) -> Self {
        self.fingerprinter = Arc::new(fingerprinter);
        self
    }

    /// Identity of the source data; a stored grid with another origin
    /// cannot be resumed
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_config(mut self, config: GridSearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an externally owned cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn grid_key(&self) -> &str {
        &self.grid_key
    }

    pub fn walker(&self) -> &W {
        &self.walker
    }

    pub fn store(&self) -> &Arc<dyn GridStore> {
        &self.store
    }

    pub fn config(&self) -> &GridSearchConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn state(&self) -> SearchState {
        *self.state.lock()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn transition(&self, to: SearchState) {
        let mut state = self.state.lock();
        info!(grid = %self.grid_key, from = %*state, to = %to, "Grid search state change");
        *state = to;
    }

    /// Run the search on the calling thread.
    ///
    /// Point construction and build errors are recorded in the grid and
    /// never returned. Any other error fails the search, unless
    /// cancellation was requested, in which case the search ends
    /// `Cancelled`.
    pub fn run(&self) -> Result<SearchOutcome<P>> {
        {
            let mut state = self.state.lock();
            if *state == SearchState::Running {
                return Err(GridError::Unexpected(format!(
                    "Grid search {} is already running",
                    self.grid_key
                )));
            }
            *state = SearchState::Initializing;
        }
        let started = Instant::now();
        let criteria = self.walker.search_criteria();
        info!(
            grid = %self.grid_key,
            strategy = criteria.strategy(),
            space_size = self.walker.hyper_space_size(),
            max_models = criteria.max_models(),
            "Starting grid search"
        );

        if let Err(e) = self.config.validate() {
            self.transition(SearchState::Failed);
            return Err(e);
        }
        let lock = match GridLock::acquire(
            Arc::clone(&self.store),
            &self.grid_key,
            &self.config.lock_owner,
        ) {
            Ok(lock) => lock,
            Err(e) => {
                self.transition(SearchState::Failed);
                return Err(e);
            }
        };
        let (mut grid, resumed) = match self.open_grid() {
            Ok(opened) => opened,
            Err(e) => {
                self.transition(SearchState::Failed);
                return Err(e);
            }
        };

        self.progress.set_total(self.walker.estimate_work());
        self.transition(SearchState::Running);

        let mut session = Session::default();
        let result = self.drive(&mut grid, &mut session, started);
        let elapsed = started.elapsed();

        let stop_reason = match result {
            Ok(reason) => reason,
            Err(e) if self.cancel.is_cancelled() => {
                warn!(grid = %self.grid_key, error = %e, "Error after cancellation request");
                StopReason::Cancelled
            }
            Err(e) => {
                self.transition(SearchState::Failed);
                self.discard_failed(&grid, resumed);
                if let Err(release_err) = lock.release() {
                    warn!(grid = %self.grid_key, error = %release_err, "Failed to release grid lock");
                }
                return Err(e);
            }
        };

        if let Err(e) = grid.save(&*self.store).and_then(|_| lock.release()) {
            self.transition(SearchState::Failed);
            return Err(e);
        }

        let state = if stop_reason == StopReason::Cancelled {
            SearchState::Cancelled
        } else {
            SearchState::Completed
        };
        self.transition(state);
        info!(
            grid = %self.grid_key,
            reason = %stop_reason,
            models = grid.model_count(),
            failures = grid.failure_count(),
            points = session.points_processed,
            cache_hits = session.cache_hits,
            elapsed_ms = elapsed.as_millis() as u64,
            "Grid search finished"
        );

        Ok(SearchOutcome {
            state,
            stop_reason,
            grid,
            points_processed: session.points_processed,
            cache_hits: session.cache_hits,
            builds: session.builds,
            elapsed,
        })
    }

    /// Load and check the stored grid, or create a fresh one
    fn open_grid(&self) -> Result<(Grid<P>, bool)> {
        let base = self.walker.base_params();
        match Grid::<P>::load(&*self.store, &self.grid_key)? {
            Some(mut grid) => {
                grid.check_origin(self.origin.as_deref())?;
                grid.check_algo(base.algo_name())?;
                grid.clear_failures();
                grid.set_hyper_names(self.walker.hyper_param_names().to_vec());
                info!(
                    grid = %self.grid_key,
                    models = grid.model_count(),
                    "Resuming existing grid"
                );
                Ok((grid, true))
            }
            None => Ok((
                Grid::new(
                    self.grid_key.clone(),
                    base.clone(),
                    self.walker.hyper_param_names().to_vec(),
                    self.origin.clone(),
                ),
                false,
            )),
        }
    }

    fn discard_failed(&self, grid: &Grid<P>, resumed: bool) {
        let result = if self.config.keep_failed_grid || resumed {
            grid.save(&*self.store)
        } else {
            self.store.remove(&self.grid_key).map(|_| ())
        };
        if let Err(e) = result {
            warn!(grid = %self.grid_key, error = %e, "Failed to clean up grid after failure");
        }
    }

    fn drive(&self, grid: &mut Grid<P>, session: &mut Session, started: Instant) -> Result<StopReason> {
        let criteria = self.walker.search_criteria();
        let metric = criteria
            .early_stopping()
            .map(|es| es.stopping_metric)
            .unwrap_or_default();
        let mut it = self.walker.iterator();

        loop {
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            let point = match it.next_point() {
                Some(point) => point,
                None => return Ok(StopReason::Exhausted),
            };
            session.points_processed += 1;

            match self.process_point(grid, &point, session, started, metric)? {
                PointResult::Model => {}
                PointResult::Failed => {
                    session.record_failure();
                    it.on_failure(&point);
                }
            }

            self.progress.advance(1);
            if self.config.checkpoint_every_point {
                grid.save(&*self.store)?;
            }

            if let Some(limit) = self.config.max_consecutive_failures {
                if session.consecutive_failures >= limit && grid.model_count() == 0 {
                    return Err(GridError::TooManyFailures {
                        failures: session.consecutive_failures,
                        limit,
                    });
                }
            }

            session.progress.elapsed = started.elapsed();
            if let Some(reason) = criteria.should_stop(&session.progress) {
                debug!(grid = %self.grid_key, reason = %reason, "Stop condition met");
                return Ok(reason);
            }
        }
    }

    fn process_point(
        &self,
        grid: &mut Grid<P>,
        point: &RawPoint,
        session: &mut Session,
        started: Instant,
        metric: StoppingMetric,
    ) -> Result<PointResult> {
        let params = match self.walker.build_params(point) {
            Ok(params) => params,
            Err(e) if e.is_point_failure() => {
                warn!(grid = %self.grid_key, point = %point, error = %e, "Cannot build parameters for point");
                grid.append_failure(FailureKind::Construction, point, None, &e);
                return Ok(PointResult::Failed);
            }
            Err(e) => return Err(e),
        };

        let fingerprint = self.fingerprinter.fingerprint(&params);
        if let Some(entry) = grid.lookup(&fingerprint) {
            debug!(
                grid = %self.grid_key,
                point = %point,
                model = %entry.model_key,
                "Configuration already built, reusing model"
            );
            let score = entry.score;
            session.cache_hits += 1;
            session.record_model(score);
            return Ok(PointResult::Model);
        }

        let ctx = BuildContext {
            model_key: grid.next_model_key(),
            model_index: session.builds,
            max_runtime: self
                .walker
                .search_criteria()
                .remaining_runtime(started.elapsed()),
            cancel: self.cancel.clone(),
        };
        session.builds += 1;
        debug!(grid = %self.grid_key, point = %point, model = %ctx.model_key, "Building model");

        let built = panic::catch_unwind(AssertUnwindSafe(|| self.builder.build(&params, &ctx)))
            .map_err(|payload| {
                GridError::Unexpected(format!("Model build panicked: {}", panic_message(&*payload)))
            })?;

        match built {
            Ok(artifact) => {
                let score = artifact.score(metric);
                grid.put_model(fingerprint, artifact.key().clone(), score);
                session.record_model(score);
                Ok(PointResult::Model)
            }
            Err(e) => {
                let kind = match e {
                    GridError::Cancelled => FailureKind::Cancelled,
                    _ => FailureKind::Build,
                };
                warn!(grid = %self.grid_key, point = %point, error = %e, "Model build failed");
                grid.append_failure(kind, point, Some(&params), &e);
                Ok(PointResult::Failed)
            }
        }
    }
}

impl<P, W, B> GridSearch<P, W, B>
where
    P: ModelParameters,
    W: HyperSpaceWalker<P> + 'static,
    B: ModelBuilder<P> + 'static,
{
    /// Run the search on a background thread
    pub fn start(self) -> Result<SearchJob<P>> {
        let grid_key = self.grid_key.clone();
        let cancel = self.cancel.clone();
        let progress = self.progress.clone();
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("grid-search-{}", grid_key))
            .spawn(move || {
                let outcome = self.run();
                if tx.send(outcome).is_err() {
                    debug!("Search job handle dropped before completion");
                }
            })?;
        Ok(SearchJob::new(grid_key, cancel, progress, rx, handle))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{EarlyStopping, SearchCriteria};
    use crate::params::FieldNaming;
    use crate::space::HyperSpace;
    use crate::test_support::{FakeBuilder, TreeParams};
    use crate::walker::CartesianWalker;

    fn walker(space: HyperSpace) -> CartesianWalker<TreeParams> {
        CartesianWalker::new(TreeParams::default(), space, FieldNaming::Consistent).unwrap()
    }

    fn depth_space() -> HyperSpace {
        HyperSpace::new()
            .with_param("ntrees", [10, 20])
            .with_param("max_depth", [2, 3, 4])
    }

    #[test]
    fn test_completed_search_builds_every_point() {
        let builder = FakeBuilder::default();
        let search = GridSearch::new(walker(depth_space()), builder.clone());
        let outcome = search.run().unwrap();

        assert_eq!(outcome.state, SearchState::Completed);
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.grid.model_count(), 6);
        assert_eq!(outcome.builds, 6);
        assert_eq!(builder.calls(), 6);
        assert_eq!(search.progress().done(), 6);
        assert_eq!(search.state(), SearchState::Completed);
    }

    #[test]
    fn test_build_failures_are_recorded() {
        let builder = FakeBuilder {
            fail_depth: Some(3),
            ..Default::default()
        };
        let outcome = GridSearch::new(walker(depth_space()), builder).run().unwrap();

        assert_eq!(outcome.state, SearchState::Completed);
        assert_eq!(outcome.grid.model_count(), 4);
        assert_eq!(outcome.grid.failure_count(), 2);
        let failure = &outcome.grid.failures()[0];
        assert_eq!(failure.kind, FailureKind::Build);
        assert!(failure.params.is_some());
    }

    #[test]
    fn test_panic_fails_search_and_discards_grid() {
        let store: Arc<dyn GridStore> = Arc::new(InMemoryGridStore::new());
        let builder = FakeBuilder {
            panic_depth: Some(3),
            ..Default::default()
        };
        let search = GridSearch::new(walker(depth_space()), builder)
            .with_grid_key("panicky")
            .with_store(Arc::clone(&store));

        let err = search.run().unwrap_err();
        assert!(matches!(err, GridError::Unexpected(_)));
        assert_eq!(search.state(), SearchState::Failed);
        assert!(store.load("panicky").unwrap().is_none());
        // Lock released on failure
        assert!(store.acquire("panicky", "someone-else").is_ok());
    }

    #[test]
    fn test_cancel_inside_build_is_not_failure() {
        let builder = FakeBuilder {
            panic_depth: Some(3),
            cancel_on_call: Some(3),
            ..Default::default()
        };
        // Third build both cancels and panics
        let space = HyperSpace::new()
            .with_param("max_depth", [2, 4, 3, 5]);
        let outcome = GridSearch::new(walker(space), builder).run().unwrap();
        assert_eq!(outcome.state, SearchState::Cancelled);
        assert_eq!(outcome.grid.model_count(), 2);
    }

    #[test]
    fn test_too_many_failures_aborts() {
        let builder = FakeBuilder {
            fail_depth: Some(2),
            ..Default::default()
        };
        let space = HyperSpace::new().with_param("max_depth", [2, 2, 2, 2]);
        let search = GridSearch::new(walker(space), builder)
            .with_config(GridSearchConfig::default().with_max_consecutive_failures(2));
        let err = search.run().unwrap_err();
        assert!(matches!(err, GridError::TooManyFailures { failures: 2, limit: 2 }));
    }

    #[test]
    fn test_early_stopping_ends_sequential_search() {
        let space = HyperSpace::new().with_param("ntrees", vec![10; 8]);
        let walker = crate::walker::create_walker(
            TreeParams::default(),
            space,
            SearchCriteria::sequential().with_early_stopping(EarlyStopping::new(
                2,
                StoppingMetric::Auc,
                0.01,
            )),
            FieldNaming::Consistent,
        )
        .unwrap();
        let outcome = GridSearch::new(walker, FakeBuilder::default()).run().unwrap();
        assert_eq!(outcome.stop_reason, StopReason::EarlyStopping);
        assert_eq!(outcome.points_processed, 4);
        // One build, the rest are cache hits on the same configuration
        assert_eq!(outcome.builds, 1);
        assert_eq!(outcome.cache_hits, 3);
    }

    #[test]
    fn test_background_job() {
        let job = GridSearch::new(walker(depth_space()), FakeBuilder::default())
            .start()
            .unwrap();
        let outcome = job.wait().unwrap();
        assert_eq!(outcome.grid.model_count(), 6);
    }
}

//! Builder providers
//!
//! Maps algorithm names to typed builders so that grid searches can be
//! submitted as JSON requests. The registry is populated explicitly: a
//! fixed list at start-up plus [`ProviderRegistry::register`] for
//! extensions.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::criteria::{SearchCriteria, StopReason};
use crate::error::{GridError, Result};
use crate::params::{FieldNaming, ModelParameters};
use crate::registry::{GridStore, ModelKey};
use crate::search::{CancellationToken, GridSearch, GridSearchConfig, ModelBuilder, SearchOutcome, SearchState};
use crate::space::{HyperSpace, HyperTable};
use crate::walker::{create_walker, HyperInput};

/// A grid search described as data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRequest {
    /// Existing grid to append to; generated when absent
    #[serde(default)]
    pub grid_key: Option<String>,
    pub algo: String,
    /// Base configuration; `null` means the algorithm defaults
    #[serde(default)]
    pub base_params: serde_json::Value,
    /// `name -> candidates`, optionally with `"subspaces"`
    #[serde(default)]
    pub hyper_space: Option<serde_json::Value>,
    /// Explicit rows for sequential search
    #[serde(default)]
    pub hyper_table: Option<HyperTable>,
    #[serde(default)]
    pub criteria: SearchCriteria,
    #[serde(default)]
    pub naming: FieldNaming,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub config: Option<GridSearchConfig>,
}

impl GridRequest {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| GridError::Config(format!("Invalid grid request: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// The space or table to walk; exactly one must be given
    pub fn hyper_input(&self) -> Result<HyperInput> {
        match (&self.hyper_space, &self.hyper_table) {
            (Some(space), None) => Ok(HyperInput::Space(HyperSpace::from_json(space)?)),
            (None, Some(table)) => Ok(HyperInput::Table(table.clone())),
            (Some(_), Some(_)) => Err(GridError::SpaceConstruction(
                "Request cannot carry both hyper_space and hyper_table".to_string(),
            )),
            (None, None) => Err(GridError::SpaceConstruction(
                "Request needs a hyper_space or a hyper_table".to_string(),
            )),
        }
    }

    /// Base configuration decoded into `P`
    pub fn base_params<P: ModelParameters>(&self) -> Result<P> {
        if self.base_params.is_null() {
            return Ok(P::default());
        }
        serde_json::from_value(self.base_params.clone()).map_err(|e| {
            GridError::Config(format!("Invalid base parameters for {}: {}", self.algo, e))
        })
    }
}

/// Serializable digest of a finished search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub grid_key: String,
    pub algo: String,
    pub state: SearchState,
    pub stop_reason: StopReason,
    pub model_keys: Vec<ModelKey>,
    pub failure_count: usize,
    pub points_processed: usize,
    pub cache_hits: usize,
    pub builds: usize,
    pub elapsed_ms: u64,
}

impl<P: ModelParameters> From<&SearchOutcome<P>> for GridSummary {
    fn from(outcome: &SearchOutcome<P>) -> Self {
        Self {
            grid_key: outcome.grid.key().to_string(),
            algo: outcome.grid.algo().to_string(),
            state: outcome.state,
            stop_reason: outcome.stop_reason,
            model_keys: outcome.grid.model_keys(),
            failure_count: outcome.grid.failure_count(),
            points_processed: outcome.points_processed,
            cache_hits: outcome.cache_hits,
            builds: outcome.builds,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        }
    }
}

/// Runs grid searches for one algorithm from JSON requests
pub trait BuilderProvider: Send + Sync {
    fn algo_name(&self) -> &str;

    fn run(
        &self,
        request: GridRequest,
        store: Arc<dyn GridStore>,
        cancel: CancellationToken,
    ) -> Result<GridSummary>;
}

/// Adapts a typed builder into a [`BuilderProvider`]
pub struct TypedProvider<P, B> {
    algo: String,
    builder: Arc<B>,
    _params: PhantomData<fn() -> P>,
}

impl<P, B> TypedProvider<P, B>
where
    P: ModelParameters,
    B: ModelBuilder<P> + 'static,
{
    pub fn new(algo: impl Into<String>, builder: B) -> Self {
        Self {
            algo: algo.into(),
            builder: Arc::new(builder),
            _params: PhantomData,
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }
}

impl<P, B> BuilderProvider for TypedProvider<P, B>
where
    P: ModelParameters,
    B: ModelBuilder<P> + 'static,
{
    fn algo_name(&self) -> &str {
        &self.algo
    }

    fn run(
        &self,
        request: GridRequest,
        store: Arc<dyn GridStore>,
        cancel: CancellationToken,
    ) -> Result<GridSummary> {
        let base: P = request.base_params()?;
        let walker = create_walker(
            base,
            request.hyper_input()?,
            request.criteria.clone(),
            request.naming,
        )?;

        let mut search = GridSearch::new(walker, Arc::clone(&self.builder))
            .with_store(store)
            .with_cancellation_token(cancel)
            .with_config(request.config.unwrap_or_default());
        if let Some(key) = request.grid_key {
            search = search.with_grid_key(key);
        }
        if let Some(origin) = request.origin {
            search = search.with_origin(origin);
        }

        let outcome = search.run()?;
        Ok(GridSummary::from(&outcome))
    }
}

/// Algorithm name to provider lookup
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn BuilderProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a fixed provider list
    pub fn from_providers(
        providers: impl IntoIterator<Item = Arc<dyn BuilderProvider>>,
    ) -> Result<Self> {
        let registry = Self::new();
        for provider in providers {
            registry.register(provider)?;
        }
        Ok(registry)
    }

    /// Add a provider; algorithm names must be unique
    pub fn register(&self, provider: Arc<dyn BuilderProvider>) -> Result<()> {
        let algo = provider.algo_name().to_string();
        let mut providers = self.providers.write();
        if providers.contains_key(&algo) {
            return Err(GridError::Config(format!(
                "A builder for {} is already registered",
                algo
            )));
        }
        info!(algo = %algo, "Registered model builder");
        providers.insert(algo, provider);
        Ok(())
    }

    pub fn get(&self, algo: &str) -> Option<Arc<dyn BuilderProvider>> {
        self.providers.read().get(algo).cloned()
    }

    pub fn contains(&self, algo: &str) -> bool {
        self.providers.read().contains_key(algo)
    }

    /// Registered algorithm names, sorted
    pub fn algos(&self) -> Vec<String> {
        let mut algos: Vec<String> = self.providers.read().keys().cloned().collect();
        algos.sort();
        algos
    }

    /// Dispatch a request to the provider of `request.algo`
    pub fn run(
        &self,
        request: GridRequest,
        store: Arc<dyn GridStore>,
        cancel: CancellationToken,
    ) -> Result<GridSummary> {
        let provider = self.get(&request.algo).ok_or_else(|| {
            GridError::Config(format!("No model builder registered for {}", request.algo))
        })?;
        provider.run(request, store, cancel)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("algos", &self.algos())
            .finish()
    }
}

//! Grid session record: result cache and failed points

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::GridStore;
use crate::error::{GridError, Result};
use crate::fingerprint::Fingerprint;
use crate::params::ModelParameters;
use crate::space::RawPoint;

/// Identity of a built artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelKey(pub String);

impl ModelKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One successfully built configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub model_key: ModelKey,
    /// Score of the model on the early stopping metric, when reported
    pub score: Option<f64>,
    pub built_at: DateTime<Utc>,
}

/// Insertion ordered `fingerprint -> model` map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CacheEntry>", into = "Vec<CacheEntry>")]
pub struct ResultCache {
    entries: Vec<CacheEntry>,
    index: HashMap<Fingerprint, usize>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&CacheEntry> {
        self.index.get(fingerprint).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.index.contains_key(fingerprint)
    }

    /// Insert an entry; an existing fingerprint is never overwritten
    pub fn insert(&mut self, entry: CacheEntry) -> bool {
        if self.index.contains_key(&entry.fingerprint) {
            return false;
        }
        self.index.insert(entry.fingerprint, self.entries.len());
        self.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in build order
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.iter()
    }

    pub fn model_keys(&self) -> Vec<ModelKey> {
        self.entries.iter().map(|e| e.model_key.clone()).collect()
    }
}

impl From<Vec<CacheEntry>> for ResultCache {
    fn from(entries: Vec<CacheEntry>) -> Self {
        let mut cache = ResultCache::new();
        for entry in entries {
            cache.insert(entry);
        }
        cache
    }
}

impl From<ResultCache> for Vec<CacheEntry> {
    fn from(cache: ResultCache) -> Self {
        cache.entries
    }
}

/// Stage at which a point failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The point could not be turned into a configuration
    Construction,
    /// The build step rejected the configuration
    Build,
    /// The build was interrupted by a cancellation
    Cancelled,
}

/// A point that did not produce a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedPoint {
    /// Position in the failure list
    pub seq: usize,
    pub kind: FailureKind,
    /// `name -> value` rendering of the raw point
    pub raw: Vec<(String, String)>,
    /// Concrete configuration, absent for construction failures
    pub params: Option<serde_json::Value>,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// Session record of a grid search.
///
/// Holds everything needed to resume the search: the base configuration,
/// the searched names, the models built so far keyed by fingerprint and the
/// points that failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid<P> {
    key: String,
    algo: String,
    base_params: P,
    hyper_names: Vec<String>,
    /// Identity of the source data the models were built from
    origin: Option<String>,
    cache: ResultCache,
    failures: Vec<FailedPoint>,
    /// Number of model keys handed out so far
    #[serde(default)]
    model_seq: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<P: ModelParameters> Grid<P> {
    pub fn new(
        key: impl Into<String>,
        base_params: P,
        hyper_names: Vec<String>,
        origin: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            algo: base_params.algo_name().to_string(),
            base_params,
            hyper_names,
            origin,
            cache: ResultCache::new(),
            failures: Vec::new(),
            model_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn algo(&self) -> &str {
        &self.algo
    }

    pub fn base_params(&self) -> &P {
        &self.base_params
    }

    pub fn hyper_names(&self) -> &[String] {
        &self.hyper_names
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn model_count(&self) -> usize {
        self.cache.len()
    }

    pub fn model_keys(&self) -> Vec<ModelKey> {
        self.cache.model_keys()
    }

    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<&CacheEntry> {
        self.cache.get(fingerprint)
    }

    pub fn failures(&self) -> &[FailedPoint] {
        &self.failures
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Reserve the key for the next model: `<grid>_model_<n>`
    pub fn next_model_key(&mut self) -> ModelKey {
        let key = ModelKey(format!("{}_model_{}", self.key, self.model_seq));
        self.model_seq += 1;
        key
    }

    /// Record a built model. Returns `false` if the fingerprint was cached.
    pub fn put_model(&mut self, fingerprint: Fingerprint, model_key: ModelKey, score: Option<f64>) -> bool {
        let inserted = self.cache.insert(CacheEntry {
            fingerprint,
            model_key,
            score,
            built_at: Utc::now(),
        });
        self.updated_at = Utc::now();
        inserted
    }

    /// Append a failed point
    pub fn append_failure(
        &mut self,
        kind: FailureKind,
        point: &RawPoint,
        params: Option<&P>,
        error: &GridError,
    ) {
        let params = params.and_then(|p| serde_json::to_value(p).ok());
        self.failures.push(FailedPoint {
            seq: self.failures.len(),
            kind,
            raw: point.describe(),
            params,
            error: error.to_string(),
            failed_at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    /// Drop failures of a previous session
    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// Replace the searched names, keeping already built models
    pub fn set_hyper_names(&mut self, names: Vec<String>) {
        self.hyper_names = names;
    }

    /// Reject appending to a grid built from different source data
    pub fn check_origin(&self, origin: Option<&str>) -> Result<()> {
        match (self.origin.as_deref(), origin) {
            (Some(existing), Some(requested)) if existing != requested => {
                Err(GridError::IncompatibleGrid(format!(
                    "Cannot append new models to a grid with different training input (grid {})",
                    self.key
                )))
            }
            _ => Ok(()),
        }
    }

    /// Reject resuming with a configuration of another algorithm
    pub fn check_algo(&self, algo: &str) -> Result<()> {
        if self.algo != algo {
            return Err(GridError::IncompatibleGrid(format!(
                "Grid {} was built with {}, cannot append {} models",
                self.key, self.algo, algo
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Persist under the grid key
    pub fn save(&self, store: &dyn GridStore) -> Result<()> {
        store.save(&self.key, &self.to_json()?)
    }

    /// Load a grid by key. The stored record must carry the same key.
    pub fn load(store: &dyn GridStore, key: &str) -> Result<Option<Self>> {
        let grid = match store.load(key)? {
            Some(value) => Self::from_json(value)?,
            None => return Ok(None),
        };
        if grid.key != key {
            return Err(GridError::Registry(format!(
                "Record stored under '{}' belongs to grid '{}'",
                key, grid.key
            )));
        }
        Ok(Some(grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryGridStore;
    use crate::space::HyperValue;
    use crate::test_support::TreeParams;
    use std::sync::Arc;

    fn grid() -> Grid<TreeParams> {
        Grid::new(
            "grid_1",
            TreeParams::default(),
            vec!["ntrees".into()],
            Some("frame-a".into()),
        )
    }

    #[test]
    fn test_cache_never_overwrites() {
        let mut g = grid();
        let key = g.next_model_key();
        assert_eq!(key.as_str(), "grid_1_model_0");
        assert!(g.put_model(Fingerprint(1), key.clone(), Some(0.5)));
        assert!(!g.put_model(Fingerprint(1), ModelKey::new("other"), None));
        assert_eq!(g.lookup(&Fingerprint(1)).unwrap().model_key, key);
        assert_eq!(g.model_count(), 1);
    }

    #[test]
    fn test_failures_keep_order() {
        let mut g = grid();
        let names: Arc<[String]> = vec!["ntrees".to_string()].into();
        for i in 0..3 {
            let point = RawPoint::new(Arc::clone(&names), vec![HyperValue::Int(i)]);
            g.append_failure(FailureKind::Build, &point, None, &GridError::Build(format!("fail {}", i)));
        }
        assert_eq!(g.failure_count(), 3);
        assert_eq!(g.failures()[2].seq, 2);
        assert_eq!(g.failures()[2].raw, vec![("ntrees".to_string(), "2".to_string())]);
        g.clear_failures();
        assert_eq!(g.failure_count(), 0);
    }

    #[test]
    fn test_origin_check() {
        let g = grid();
        assert!(g.check_origin(Some("frame-a")).is_ok());
        assert!(g.check_origin(None).is_ok());
        assert!(matches!(
            g.check_origin(Some("frame-b")),
            Err(GridError::IncompatibleGrid(_))
        ));
    }

    #[test]
    fn test_persist_and_reload() {
        let store = InMemoryGridStore::new();
        let mut g = grid();
        let key = g.next_model_key();
        g.put_model(Fingerprint(42), key, Some(0.25));
        g.save(&store).unwrap();

        let loaded: Grid<TreeParams> = Grid::load(&store, "grid_1").unwrap().unwrap();
        assert_eq!(loaded.model_count(), 1);
        assert!(loaded.lookup(&Fingerprint(42)).is_some());
        assert_eq!(loaded.origin(), Some("frame-a"));

        let mut resumed = loaded;
        assert_eq!(resumed.next_model_key().as_str(), "grid_1_model_1");
        assert!(Grid::<TreeParams>::load(&store, "missing").unwrap().is_none());
    }

    #[test]
    fn test_load_rejects_record_of_other_grid() {
        let store = InMemoryGridStore::new();
        let g = grid();
        store.save("grid/1", &g.to_json().unwrap()).unwrap();

        let result = Grid::<TreeParams>::load(&store, "grid/1");
        assert!(matches!(result, Err(GridError::Registry(_))));
        assert!(Grid::<TreeParams>::load(&store, "grid_1").unwrap().is_none());
    }
}

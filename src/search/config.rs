//! Grid search configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::error::{GridError, Result};

/// Session behaviour of a grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchConfig {
    /// Abort with `TooManyFailures` once this many points failed in a row
    /// without any model built
    pub max_consecutive_failures: Option<usize>,

    /// Persist the grid after every processed point
    pub checkpoint_every_point: bool,

    /// Keep the stored grid when the search fails
    pub keep_failed_grid: bool,

    /// Identity used for the grid write lock
    pub lock_owner: String,
}

impl Default for GridSearchConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: None,
            checkpoint_every_point: true,
            keep_failed_grid: false,
            lock_owner: format!("grid-search-{}", Uuid::new_v4()),
        }
    }
}

impl GridSearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to bound consecutive failures
    pub fn with_max_consecutive_failures(mut self, limit: usize) -> Self {
        self.max_consecutive_failures = Some(limit);
        self
    }

    pub fn with_checkpoint_every_point(mut self, enabled: bool) -> Self {
        self.checkpoint_every_point = enabled;
        self
    }

    pub fn with_keep_failed_grid(mut self, keep: bool) -> Self {
        self.keep_failed_grid = keep;
        self
    }

    pub fn with_lock_owner(mut self, owner: impl Into<String>) -> Self {
        self.lock_owner = owner.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.lock_owner.is_empty() {
            return Err(GridError::Config("lock_owner cannot be empty".to_string()));
        }
        if self.max_consecutive_failures == Some(0) {
            return Err(GridError::Config(
                "max_consecutive_failures must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)
            .map_err(|e| GridError::Config(format!("Invalid grid search config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }
}

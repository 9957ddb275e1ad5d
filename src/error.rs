//! Error types for the grid search engine

use thiserror::Error;

/// Result type alias for grid search operations
pub type Result<T> = std::result::Result<T, GridError>;

/// Main error type for the grid search engine
#[derive(Error, Debug)]
pub enum GridError {
    #[error("Hyperparameter space error: {0}")]
    SpaceConstruction(String),

    #[error("Cannot build parameters: {name}, {reason}")]
    PointConstruction { name: String, reason: String },

    #[error("Invalid value for {name}: {value}, expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },

    #[error("Build error: {0}")]
    Build(String),

    #[error("Job canceled")]
    Cancelled,

    #[error("Incompatible grid: {0}")]
    IncompatibleGrid(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Grid {key} is locked by {owner}")]
    Locked { key: String, owner: String },

    #[error("Aborting grid search after {failures} consecutive failures (limit {limit})")]
    TooManyFailures { failures: usize, limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl GridError {
    /// Whether the error belongs to a single point and should be recorded
    /// rather than aborting the search.
    pub fn is_point_failure(&self) -> bool {
        matches!(
            self,
            GridError::PointConstruction { .. } | GridError::InvalidValue { .. } | GridError::Build(_)
        )
    }

    /// Shorthand for an unassignable hyperparameter name.
    pub fn unknown_field(name: impl Into<String>, algo: &str) -> Self {
        GridError::PointConstruction {
            name: name.into(),
            reason: format!("no such parameter for {}", algo),
        }
    }
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::Serialization(err.to_string())
    }
}

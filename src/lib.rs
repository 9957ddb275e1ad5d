//! Kolosal Grid - Hyperparameter grid search engine
//!
//! This crate enumerates hyperparameter spaces and drives a model builder
//! over them, caching every built configuration so a search can be resumed
//! or extended without rebuilding.
//!
//! # Modules
//!
//! ## Spaces and configurations
//! - [`space`] - Hyperparameter spaces, tables and raw points
//! - [`params`] - Setter tables and the parameter builder
//! - [`fingerprint`] - Cache keys of concrete configurations
//!
//! ## Search strategies
//! - [`walker`] - Cartesian, sequential and random walkers
//! - [`filter`] - Permutation filters and the filtering decorator
//! - [`criteria`] - Stopping policies and early stopping
//!
//! ## Sessions
//! - [`registry`] - Grid records, result cache and grid stores
//! - [`search`] - The search loop, build contract and background jobs
//! - [`providers`] - JSON requests dispatched to typed builders

// Core error handling
pub mod error;

// Spaces and configurations
pub mod space;
pub mod params;
pub mod fingerprint;

// Search strategies
pub mod walker;
pub mod filter;
pub mod criteria;

// Sessions
pub mod registry;
pub mod search;
pub mod providers;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{GridError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{GridError, Result};

    // Spaces
    pub use crate::space::{HyperSpace, HyperTable, HyperValue, RawPoint};

    // Configurations
    pub use crate::params::{FieldNaming, FieldTable, ModelParameters, ParamsBuilder};
    pub use crate::fingerprint::{FieldFingerprinter, Fingerprint, Fingerprinter};

    // Walkers and filters
    pub use crate::walker::{
        create_walker, CartesianWalker, HyperInput, HyperSpaceIterator, HyperSpaceWalker,
        RandomWalker, SequentialWalker,
    };
    pub use crate::filter::{AnyMatchFilter, FilteredWalker, PermutationFilter};

    // Criteria
    pub use crate::criteria::{EarlyStopping, SearchCriteria, StopReason, StoppingMetric};

    // Registry
    pub use crate::registry::{FileGridStore, Grid, GridStore, InMemoryGridStore, ModelKey};

    // Search
    pub use crate::search::{
        BuildContext, CancellationToken, GridSearch, GridSearchConfig, ModelArtifact,
        ModelBuilder, SearchJob, SearchOutcome, SearchState,
    };

    // Providers
    pub use crate::providers::{BuilderProvider, GridRequest, GridSummary, ProviderRegistry, TypedProvider};
}

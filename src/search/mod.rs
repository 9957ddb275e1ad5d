//! Grid search orchestration
//!
//! Provides:
//! - The build contract ([`ModelBuilder`], [`ModelArtifact`])
//! - The sequential search loop with its state machine ([`GridSearch`])
//! - Cancellation, progress and background jobs

mod builder;
mod config;
mod job;
mod orchestrator;

pub use builder::{BuildContext, ModelArtifact, ModelBuilder};
pub use config::GridSearchConfig;
pub use job::{CancellationToken, Progress, SearchJob};
pub use orchestrator::{GridSearch, SearchOutcome, SearchState};

//! Result registry
//!
//! Provides:
//! - The grid session record with its fingerprint keyed result cache
//! - Failed point records
//! - Grid stores (in-memory and JSON files) with session locks

mod grid;
mod store;

pub use grid::{CacheEntry, FailedPoint, FailureKind, Grid, ModelKey, ResultCache};
pub use store::{FileGridStore, GridLock, GridStore, InMemoryGridStore};

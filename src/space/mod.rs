//! Hyperparameter spaces
//!
//! Provides:
//! - Candidate values (`HyperValue`)
//! - Ordered spaces with nested sub-spaces (`HyperSpace`)
//! - Explicit point tables for sequential search (`HyperTable`)
//! - Raw points as produced by the walkers (`RawPoint`)

mod hyper_space;
mod point;
mod value;

pub use hyper_space::{HyperParam, HyperSpace, HyperTable, SpaceLayout, SUBSPACES_KEY};
pub use point::RawPoint;
pub use value::HyperValue;

//! Model parameters and the parameter builder
//!
//! Configuration types expose a closed table of named fields instead of
//! being patched reflectively; the builder applies raw points onto clones
//! of the base configuration through that table.

mod builder;
mod fields;

pub use builder::ParamsBuilder;
pub use fields::{Field, FieldNaming, FieldTable, Getter, ModelParameters, Setter};

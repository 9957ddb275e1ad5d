//! Closed setter tables for model configuration types

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::space::HyperValue;

/// Reads a field as a hyperparameter value
pub type Getter<P> = fn(&P) -> HyperValue;

/// Writes a hyperparameter value into a field
pub type Setter<P> = fn(&mut P, &HyperValue) -> Result<()>;

/// A named, assignable field of a configuration type
pub struct Field<P> {
    name: &'static str,
    get: Getter<P>,
    set: Setter<P>,
}

impl<P> Field<P> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current value of the field in `params`
    pub fn read(&self, params: &P) -> HyperValue {
        (self.get)(params)
    }

    /// Assign `value` to the field of `params`
    pub fn write(&self, params: &mut P, value: &HyperValue) -> Result<()> {
        (self.set)(params, value)
    }
}

impl<P> Clone for Field<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            get: self.get,
            set: self.set,
        }
    }
}

impl<P> std::fmt::Debug for Field<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

/// Ordered table of every field a hyperparameter search may assign.
///
/// ```ignore
/// FieldTable::<Gbm>::new()
///     .field("ntrees", |p: &Gbm| p.ntrees.into(), |p, v| {
///         p.ntrees = v.as_usize("ntrees")?;
///         Ok(())
///     })
/// ```
#[derive(Debug)]
pub struct FieldTable<P> {
    fields: Vec<Field<P>>,
}

impl<P> FieldTable<P> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Register a field
    pub fn field(mut self, name: &'static str, get: Getter<P>, set: Setter<P>) -> Self {
        self.fields.push(Field { name, get, set });
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field<P>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field<P>> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<P> Default for FieldTable<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for FieldTable<P> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

/// A model configuration that can be searched over.
///
/// Implementors are plain immutable values: the search only ever clones
/// the base configuration and assigns through the field table.
pub trait ModelParameters:
    Clone + std::fmt::Debug + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Name of the algorithm the configuration belongs to
    fn algo_name(&self) -> &str;

    /// Every field assignable from a hyperparameter space
    fn fields() -> FieldTable<Self>;

    /// Field holding the model training seed. Random searches derive one
    /// seed per model from the search seed while the base keeps its default.
    fn seed_field() -> Option<&'static str> {
        None
    }
}

/// How hyperparameter names map onto field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldNaming {
    /// A leading underscore is ignored, so `_ntrees` and `ntrees` match the same field
    #[default]
    Consistent,
    /// Names are used verbatim
    Exact,
}

impl FieldNaming {
    pub fn resolve<'a>(&self, name: &'a str) -> &'a str {
        match self {
            FieldNaming::Consistent => name.strip_prefix('_').unwrap_or(name),
            FieldNaming::Exact => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_resolution() {
        assert_eq!(FieldNaming::Consistent.resolve("_ntrees"), "ntrees");
        assert_eq!(FieldNaming::Consistent.resolve("ntrees"), "ntrees");
        assert_eq!(FieldNaming::Exact.resolve("_ntrees"), "_ntrees");
    }
}

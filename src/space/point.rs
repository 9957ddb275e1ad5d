//! Raw points produced by the walkers

use std::fmt;
use std::sync::Arc;

use super::HyperValue;

/// One concrete assignment of a value to every hyperparameter name.
///
/// Values are aligned by index with `names`; the name list is shared
/// between all points of the same (sub-)space.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    names: Arc<[String]>,
    values: Vec<HyperValue>,
    model_seed: Option<i64>,
}

impl RawPoint {
    pub fn new(names: Arc<[String]>, values: Vec<HyperValue>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self {
            names,
            values,
            model_seed: None,
        }
    }

    /// Attach the training seed of the model built from this point
    pub fn with_model_seed(mut self, seed: i64) -> Self {
        self.model_seed = Some(seed);
        self
    }

    /// Training seed assigned by the walker, if any
    pub fn model_seed(&self) -> Option<i64> {
        self.model_seed
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[HyperValue] {
        &self.values
    }

    /// Value assigned to `name`, if the point carries it
    pub fn get(&self, name: &str) -> Option<&HyperValue> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HyperValue)> {
        self.names.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// String rendering kept in failure records
    pub fn describe(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }
}

impl fmt::Display for RawPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        write!(f, "}}")
    }
}

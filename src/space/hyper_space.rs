//! Hyperparameter spaces and explicit hyperparameter tables

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use super::{HyperValue, RawPoint};
use crate::error::{GridError, Result};

/// Reserved key holding nested sub-spaces in the JSON form of a space
pub const SUBSPACES_KEY: &str = "subspaces";

/// A named hyperparameter and its ordered candidate values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParam {
    pub name: String,
    pub values: Vec<HyperValue>,
}

/// Ordered mapping of hyperparameter names to candidate values.
///
/// A space may carry nested sub-spaces: each sub-space is combined with
/// the top-level parameters independently, so
/// `{a: [1, 2], subspaces: [{b: [1, 2]}, {c: [1, 2, 3]}]}` describes
/// `2 * (2 + 3)` points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperSpace {
    params: Vec<HyperParam>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    subspaces: Vec<HyperSpace>,
}

impl HyperSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter with its candidate values
    pub fn with_param<V, I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        V: Into<HyperValue>,
        I: IntoIterator<Item = V>,
    {
        self.params.push(HyperParam {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add a nested sub-space
    pub fn with_subspace(mut self, subspace: HyperSpace) -> Self {
        self.subspaces.push(subspace);
        self
    }

    pub fn params(&self) -> &[HyperParam] {
        &self.params
    }

    pub fn subspaces(&self) -> &[HyperSpace] {
        &self.subspaces
    }

    /// Candidate values of a top-level parameter
    pub fn values(&self, name: &str) -> Option<&[HyperValue]> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.values.as_slice())
    }

    /// Every parameter name, top level first, then sub-space names in
    /// declaration order without repetition.
    pub fn names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let nested = self.subspaces.iter().flat_map(|s| s.params.iter());
        for param in self.params.iter().chain(nested) {
            if seen.insert(param.name.as_str()) {
                names.push(param.name.clone());
            }
        }
        names
    }

    /// Check the structural invariants of the space
    pub fn validate(&self) -> Result<()> {
        if self.params.is_empty() && self.subspaces.is_empty() {
            return Err(GridError::SpaceConstruction(
                "Hyper space is empty".to_string(),
            ));
        }

        let top = validate_params(&self.params)?;

        for (idx, sub) in self.subspaces.iter().enumerate() {
            if !sub.subspaces.is_empty() {
                return Err(GridError::SpaceConstruction(format!(
                    "Subspace {} cannot contain nested subspaces",
                    idx
                )));
            }
            if sub.params.is_empty() {
                return Err(GridError::SpaceConstruction(format!(
                    "Subspace {} is empty",
                    idx
                )));
            }
            let names = validate_params(&sub.params)?;
            if let Some(dup) = names.iter().find(|n| top.contains(*n)) {
                return Err(GridError::SpaceConstruction(format!(
                    "Hyper parameter {} is defined both inside and outside of subspaces",
                    dup
                )));
            }
        }
        Ok(())
    }

    /// Number of points described by the space
    pub fn size(&self) -> u64 {
        let top = product(&self.params);
        if self.subspaces.is_empty() {
            return top;
        }
        let nested = self
            .subspaces
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(product(&s.params)));
        top.saturating_mul(nested)
    }

    /// Flatten the space into one layout per sub-space (or a single
    /// layout when there are none).
    pub fn layouts(&self) -> Vec<SpaceLayout> {
        if self.subspaces.is_empty() {
            return vec![SpaceLayout::from_params(self.params.iter())];
        }
        self.subspaces
            .iter()
            .map(|sub| SpaceLayout::from_params(self.params.iter().chain(sub.params.iter())))
            .collect()
    }

    /// Parse a JSON object of `name -> [values]`, with an optional
    /// `"subspaces"` array of objects of the same shape.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            GridError::SpaceConstruction("Hyper space must be a JSON object".to_string())
        })?;

        let mut space = HyperSpace::new();
        for (name, candidates) in object {
            if name == SUBSPACES_KEY {
                let subs = candidates.as_array().ok_or_else(|| {
                    GridError::SpaceConstruction("subspaces must be an array".to_string())
                })?;
                for sub in subs {
                    space.subspaces.push(HyperSpace::from_json(sub)?);
                }
                continue;
            }
            let values: Vec<HyperValue> = match candidates {
                serde_json::Value::Array(_) => serde_json::from_value(candidates.clone())?,
                single => vec![serde_json::from_value(single.clone())?],
            };
            space.params.push(HyperParam {
                name: name.clone(),
                values,
            });
        }
        space.validate()?;
        Ok(space)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        Self::from_json(&value)
    }
}

fn validate_params(params: &[HyperParam]) -> Result<HashSet<&str>> {
    let mut names = HashSet::with_capacity(params.len());
    for param in params {
        if param.name.is_empty() {
            return Err(GridError::SpaceConstruction(
                "Hyper parameter name cannot be empty".to_string(),
            ));
        }
        if !names.insert(param.name.as_str()) {
            return Err(GridError::SpaceConstruction(format!(
                "Duplicated hyper parameter: {}",
                param.name
            )));
        }
        if param.values.is_empty() {
            return Err(GridError::SpaceConstruction(format!(
                "Grid search parameter '{}' has no values",
                param.name
            )));
        }
    }
    Ok(names)
}

fn product(params: &[HyperParam]) -> u64 {
    params
        .iter()
        .fold(1u64, |acc, p| acc.saturating_mul(p.values.len() as u64))
}

/// A flat, mixed-radix view over one (sub-)space.
#[derive(Debug, Clone)]
pub struct SpaceLayout {
    names: Arc<[String]>,
    candidates: Vec<Vec<HyperValue>>,
}

impl SpaceLayout {
    fn from_params<'a>(params: impl Iterator<Item = &'a HyperParam>) -> Self {
        let (names, candidates): (Vec<String>, Vec<Vec<HyperValue>>) = params
            .map(|p| (p.name.clone(), p.values.clone()))
            .unzip();
        Self {
            names: names.into(),
            candidates,
        }
    }

    pub fn names(&self) -> &Arc<[String]> {
        &self.names
    }

    /// Radix of every digit
    pub fn radices(&self) -> Vec<usize> {
        self.candidates.iter().map(Vec::len).collect()
    }

    pub fn size(&self) -> u64 {
        self.candidates
            .iter()
            .fold(1u64, |acc, c| acc.saturating_mul(c.len() as u64))
    }

    /// Materialize the point selected by `digits`
    pub fn point(&self, digits: &[usize]) -> RawPoint {
        let values = self
            .candidates
            .iter()
            .zip(digits)
            .map(|(values, &d)| values[d].clone())
            .collect();
        RawPoint::new(Arc::clone(&self.names), values)
    }
}

/// Explicit table of points: a header of names plus one row per point.
///
/// Used by sequential search. A `null` cell keeps the base value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperTable {
    names: Vec<String>,
    rows: Vec<Vec<HyperValue>>,
}

impl HyperTable {
    /// Create a validated table
    pub fn new(names: Vec<String>, rows: Vec<Vec<HyperValue>>) -> Result<Self> {
        let table = Self { names, rows };
        table.validate()?;
        Ok(table)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rows(&self) -> &[Vec<HyperValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.names.is_empty() {
            return Err(GridError::SpaceConstruction(
                "Hyper table has no columns".to_string(),
            ));
        }
        if self.rows.is_empty() {
            return Err(GridError::SpaceConstruction(
                "Hyper table has no rows".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for name in &self.names {
            if name.is_empty() || !seen.insert(name.as_str()) {
                return Err(GridError::SpaceConstruction(format!(
                    "Invalid or duplicated column name: '{}'",
                    name
                )));
            }
        }
        for (idx, row) in self.rows.iter().enumerate() {
            if row.len() != self.names.len() {
                return Err(GridError::SpaceConstruction(format!(
                    "Row {} has {} values, expected {}",
                    idx,
                    row.len(),
                    self.names.len()
                )));
            }
        }
        Ok(())
    }

    /// Read a space column-wise: the i-th row takes the i-th candidate of
    /// every parameter. All candidate lists must have the same length.
    pub fn from_columns(space: &HyperSpace) -> Result<Self> {
        if !space.subspaces.is_empty() {
            return Err(GridError::SpaceConstruction(
                "Sequential search does not support subspaces".to_string(),
            ));
        }
        validate_params(&space.params)?;
        let n_rows = space.params.first().map(|p| p.values.len()).unwrap_or(0);
        if let Some(bad) = space.params.iter().find(|p| p.values.len() != n_rows) {
            return Err(GridError::SpaceConstruction(format!(
                "Parameter '{}' has {} values, expected {}",
                bad.name,
                bad.values.len(),
                n_rows
            )));
        }
        let names = space.params.iter().map(|p| p.name.clone()).collect();
        let rows = (0..n_rows)
            .map(|i| space.params.iter().map(|p| p.values[i].clone()).collect())
            .collect();
        Self::new(names, rows)
    }

    /// Load a table from a JSON file of the form `{"names": [...], "rows": [[...]]}`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let table: HyperTable = serde_json::from_str(&data)?;
        table.validate()?;
        Ok(table)
    }
}

//! Configuration fingerprints
//!
//! A fingerprint is a cheap, deterministic cache key derived from the full
//! field state of a concrete configuration. It is computed on the frozen
//! value before any build step sees it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

use crate::params::{FieldTable, ModelParameters};

/// Fields excluded from the default fingerprint
pub const DEFAULT_IGNORED_FIELDS: &[&str] = &["max_runtime_secs"];

/// Stable 64-bit key of a concrete configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Computes fingerprints for configurations of type `P`
pub trait Fingerprinter<P>: Send + Sync {
    fn fingerprint(&self, params: &P) -> Fingerprint;
}

impl<P, F> Fingerprinter<P> for F
where
    F: Fn(&P) -> Fingerprint + Send + Sync,
{
    fn fingerprint(&self, params: &P) -> Fingerprint {
        self(params)
    }
}

/// Hashes the algorithm name and every field of the field table with xxh3.
#[derive(Debug, Clone)]
pub struct FieldFingerprinter<P> {
    fields: FieldTable<P>,
    ignored: HashSet<String>,
}

impl<P: ModelParameters> FieldFingerprinter<P> {
    pub fn new() -> Self {
        Self {
            fields: P::fields(),
            ignored: DEFAULT_IGNORED_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Exclude another field from the fingerprint
    pub fn with_ignored(mut self, name: impl Into<String>) -> Self {
        self.ignored.insert(name.into());
        self
    }

    /// Canonical byte encoding that is hashed
    pub fn canonical_bytes(&self, params: &P) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.fields.len() * 24);
        let algo = params.algo_name();
        buf.extend_from_slice(&(algo.len() as u64).to_le_bytes());
        buf.extend_from_slice(algo.as_bytes());
        for field in self.fields.iter() {
            if self.ignored.contains(field.name()) {
                continue;
            }
            buf.extend_from_slice(&(field.name().len() as u64).to_le_bytes());
            buf.extend_from_slice(field.name().as_bytes());
            field.read(params).write_canonical(&mut buf);
        }
        buf
    }
}

impl<P: ModelParameters> Default for FieldFingerprinter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ModelParameters> Fingerprinter<P> for FieldFingerprinter<P> {
    fn fingerprint(&self, params: &P) -> Fingerprint {
        Fingerprint(xxh3_64(&self.canonical_bytes(params)))
    }
}

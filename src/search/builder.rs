//! Build contract between the search and a model trainer

use std::sync::Arc;
use std::time::Duration;

use super::job::CancellationToken;
use crate::criteria::StoppingMetric;
use crate::error::Result;
use crate::registry::ModelKey;

/// Handle to a built model
pub trait ModelArtifact: Send {
    /// Stable identity stored in the result cache
    fn key(&self) -> &ModelKey;

    /// Score on `metric`, used for early stopping
    fn score(&self, _metric: StoppingMetric) -> Option<f64> {
        None
    }
}

/// Everything a build receives besides the configuration
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Key the artifact should be stored under
    pub model_key: ModelKey,
    /// Position of the build in this session
    pub model_index: usize,
    /// Time left of the search runtime budget
    pub max_runtime: Option<Duration>,
    pub cancel: CancellationToken,
}

impl BuildContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Turns a concrete configuration into a model.
///
/// Builds block the calling thread. A build only sees a shared reference
/// to the configuration, which has already been fingerprinted.
pub trait ModelBuilder<P>: Send + Sync {
    type Artifact: ModelArtifact;

    fn build(&self, params: &P, ctx: &BuildContext) -> Result<Self::Artifact>;
}

impl<P, B: ModelBuilder<P>> ModelBuilder<P> for Arc<B> {
    type Artifact = B::Artifact;

    fn build(&self, params: &P, ctx: &BuildContext) -> Result<Self::Artifact> {
        (**self).build(params, ctx)
    }
}

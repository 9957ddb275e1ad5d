//! Hyper-space walkers
//!
//! A walker enumerates the points of a hyperparameter space for one base
//! configuration. Every call to [`HyperSpaceWalker::iterator`] starts a
//! fresh, independent pass:
//! - [`CartesianWalker`]: full factorial, mixed-radix order
//! - [`SequentialWalker`]: explicit rows, in order
//! - [`RandomWalker`]: seeded sampling without replacement

mod cartesian;
mod random;
mod sequential;

pub use cartesian::{CartesianIterator, CartesianWalker};
pub use random::{RandomIterator, RandomWalker};
pub use sequential::{SequentialIterator, SequentialWalker};

use crate::criteria::SearchCriteria;
use crate::error::{GridError, Result};
use crate::params::{FieldNaming, ModelParameters, ParamsBuilder};
use crate::space::{HyperSpace, HyperTable, RawPoint};

/// Iteration protocol shared by all walkers and decorators
pub trait HyperSpaceIterator: Send {
    /// Whether another point may be produced. Never mutates state.
    fn has_next(&self) -> bool;

    /// Produce the next point, or `None` when the walk is over
    fn next_point(&mut self) -> Option<RawPoint>;

    /// Report that the point could not be turned into a model
    fn on_failure(&mut self, point: &RawPoint);

    /// Last point handed out
    fn current_raw_parameters(&self) -> Option<RawPoint>;

    /// Number of points handed out so far
    fn visited(&self) -> usize;
}

/// Strategy enumerating concrete configurations of a hyperparameter space
pub trait HyperSpaceWalker<P: ModelParameters>: Send + Sync {
    /// Start a new pass over the space
    fn iterator(&self) -> Box<dyn HyperSpaceIterator>;

    /// Start a pass that ignores the `max_models` budget. Used by
    /// decorators that count models themselves.
    fn unbounded_iterator(&self) -> Box<dyn HyperSpaceIterator> {
        self.iterator()
    }

    /// Number of points in the space (an upper bound when filtered)
    fn hyper_space_size(&self) -> u64;

    fn hyper_param_names(&self) -> &[String];

    fn base_params(&self) -> &P;

    fn params_builder(&self) -> &ParamsBuilder<P>;

    fn search_criteria(&self) -> &SearchCriteria;

    /// Concrete configuration for a point
    fn build_params(&self, point: &RawPoint) -> Result<P> {
        self.params_builder().build(self.base_params(), point)
    }

    /// Units of work a search over this walker consumes
    fn estimate_work(&self) -> u64 {
        let size = self.hyper_space_size();
        match self.search_criteria().max_models() {
            0 => size,
            max => size.min(max as u64),
        }
    }
}

impl<P: ModelParameters, W: HyperSpaceWalker<P> + ?Sized> HyperSpaceWalker<P> for Box<W> {
    fn iterator(&self) -> Box<dyn HyperSpaceIterator> {
        (**self).iterator()
    }

    fn unbounded_iterator(&self) -> Box<dyn HyperSpaceIterator> {
        (**self).unbounded_iterator()
    }

    fn hyper_space_size(&self) -> u64 {
        (**self).hyper_space_size()
    }

    fn hyper_param_names(&self) -> &[String] {
        (**self).hyper_param_names()
    }

    fn base_params(&self) -> &P {
        (**self).base_params()
    }

    fn params_builder(&self) -> &ParamsBuilder<P> {
        (**self).params_builder()
    }

    fn search_criteria(&self) -> &SearchCriteria {
        (**self).search_criteria()
    }

    fn estimate_work(&self) -> u64 {
        (**self).estimate_work()
    }
}

/// State shared by every walker: the immutable base configuration, the
/// builder and the policy.
#[derive(Debug, Clone)]
pub(crate) struct WalkerCore<P> {
    pub(crate) base: P,
    pub(crate) builder: ParamsBuilder<P>,
    pub(crate) criteria: SearchCriteria,
    pub(crate) names: Vec<String>,
}

impl<P: ModelParameters> WalkerCore<P> {
    pub(crate) fn new(
        base: P,
        names: Vec<String>,
        criteria: SearchCriteria,
        naming: FieldNaming,
    ) -> Result<Self> {
        let builder = ParamsBuilder::new(naming);
        builder.validate_space(&base, &names)?;
        Ok(Self {
            base,
            builder,
            criteria,
            names,
        })
    }
}

/// Hyperparameters to walk
#[derive(Debug, Clone)]
pub enum HyperInput {
    /// `name -> candidates`; for sequential search every list is a column
    Space(HyperSpace),
    /// Explicit rows
    Table(HyperTable),
}

impl From<HyperSpace> for HyperInput {
    fn from(space: HyperSpace) -> Self {
        HyperInput::Space(space)
    }
}

impl From<HyperTable> for HyperInput {
    fn from(table: HyperTable) -> Self {
        HyperInput::Table(table)
    }
}

/// Create the walker matching the search strategy
pub fn create_walker<P: ModelParameters>(
    base: P,
    input: impl Into<HyperInput>,
    criteria: SearchCriteria,
    naming: FieldNaming,
) -> Result<Box<dyn HyperSpaceWalker<P>>> {
    match input.into() {
        HyperInput::Space(space) => match criteria {
            SearchCriteria::Cartesian => Ok(Box::new(CartesianWalker::new(base, space, naming)?)),
            SearchCriteria::RandomDiscrete(_) => {
                Ok(Box::new(RandomWalker::new(base, space, criteria, naming)?))
            }
            SearchCriteria::Sequential(_) => {
                let table = HyperTable::from_columns(&space)?;
                Ok(Box::new(SequentialWalker::new(base, table, criteria, naming)?))
            }
        },
        HyperInput::Table(table) => match criteria {
            SearchCriteria::Sequential(_) => {
                Ok(Box::new(SequentialWalker::new(base, table, criteria, naming)?))
            }
            _ => Err(GridError::SpaceConstruction(format!(
                "{} search needs a hyperparameter space, not a table",
                criteria.strategy()
            ))),
        },
    }
}

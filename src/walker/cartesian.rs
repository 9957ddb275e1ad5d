//! Cartesian (full factorial) walker

use std::sync::Arc;

use super::{HyperSpaceIterator, HyperSpaceWalker, WalkerCore};
use crate::criteria::SearchCriteria;
use crate::error::Result;
use crate::params::{FieldNaming, ModelParameters, ParamsBuilder};
use crate::space::{HyperSpace, RawPoint, SpaceLayout};

/// Walks every point of the space exactly once.
///
/// Points are enumerated with a mixed-radix counter where the first
/// parameter is the lowest digit: `{a: [1, 2], b: [1, 2, 5]}` yields
/// `(1,1) (2,1) (1,2) (2,2) (1,5) (2,5)`. Sub-spaces are walked one after
/// another in declaration order.
#[derive(Debug, Clone)]
pub struct CartesianWalker<P> {
    core: WalkerCore<P>,
    layouts: Arc<[SpaceLayout]>,
    size: u64,
}

impl<P: ModelParameters> CartesianWalker<P> {
    pub fn new(base: P, space: HyperSpace, naming: FieldNaming) -> Result<Self> {
        space.validate()?;
        let core = WalkerCore::new(base, space.names(), SearchCriteria::Cartesian, naming)?;
        Ok(Self {
            core,
            layouts: space.layouts().into(),
            size: space.size(),
        })
    }
}

impl<P: ModelParameters> HyperSpaceWalker<P> for CartesianWalker<P> {
    fn iterator(&self) -> Box<dyn HyperSpaceIterator> {
        Box::new(CartesianIterator::new(Arc::clone(&self.layouts)))
    }

    fn hyper_space_size(&self) -> u64 {
        self.size
    }

    fn hyper_param_names(&self) -> &[String] {
        &self.core.names
    }

    fn base_params(&self) -> &P {
        &self.core.base
    }

    fn params_builder(&self) -> &ParamsBuilder<P> {
        &self.core.builder
    }

    fn search_criteria(&self) -> &SearchCriteria {
        &self.core.criteria
    }
}

/// Odometer over a list of layouts
#[derive(Debug, Clone)]
pub struct CartesianIterator {
    layouts: Arc<[SpaceLayout]>,
    /// Current layout and digits; `None` before the first point
    position: Option<(usize, Vec<usize>)>,
    visited: usize,
}

impl CartesianIterator {
    pub fn new(layouts: Arc<[SpaceLayout]>) -> Self {
        Self {
            layouts,
            position: None,
            visited: 0,
        }
    }

    /// Position following the current one, computed on a copy
    fn successor(&self) -> Option<(usize, Vec<usize>)> {
        let (layout_idx, digits) = match &self.position {
            None => return self.first_of(0),
            Some(pos) => pos,
        };

        let radices = self.layouts[*layout_idx].radices();
        let mut next = digits.clone();
        for i in 0..next.len() {
            if next[i] + 1 < radices[i] {
                next[i] += 1;
                next[..i].iter_mut().for_each(|d| *d = 0);
                return Some((*layout_idx, next));
            }
        }
        self.first_of(layout_idx + 1)
    }

    fn first_of(&self, layout_idx: usize) -> Option<(usize, Vec<usize>)> {
        self.layouts
            .get(layout_idx)
            .map(|layout| (layout_idx, vec![0; layout.radices().len()]))
    }
}

impl HyperSpaceIterator for CartesianIterator {
    fn has_next(&self) -> bool {
        self.successor().is_some()
    }

    fn next_point(&mut self) -> Option<RawPoint> {
        let next = self.successor()?;
        self.position = Some(next);
        self.visited += 1;
        self.current_raw_parameters()
    }

    fn on_failure(&mut self, _point: &RawPoint) {}

    fn current_raw_parameters(&self) -> Option<RawPoint> {
        self.position
            .as_ref()
            .map(|(layout_idx, digits)| self.layouts[*layout_idx].point(digits))
    }

    fn visited(&self) -> usize {
        self.visited
    }
}

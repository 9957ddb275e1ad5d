//! Permutation filters
//!
//! A filter rejects structurally invalid points before a configuration is
//! built. [`FilteredWalker`] decorates any walker; decorators nest and
//! their filters combine with AND semantics.

use std::fmt;
use std::sync::Arc;

use crate::criteria::SearchCriteria;
use crate::params::{ModelParameters, ParamsBuilder};
use crate::space::RawPoint;
use crate::walker::{HyperSpaceIterator, HyperSpaceWalker};

/// Predicate over raw points; `true` keeps the point
pub trait PermutationFilter: Send + Sync {
    fn accept(&self, point: &RawPoint) -> bool;
}

impl<F> PermutationFilter for F
where
    F: Fn(&RawPoint) -> bool + Send + Sync,
{
    fn accept(&self, point: &RawPoint) -> bool {
        self(point)
    }
}

type FilterFn = Box<dyn Fn(&RawPoint) -> bool + Send + Sync>;

/// Rejects a point as soon as any of its functions rejects it
#[derive(Default)]
pub struct AnyMatchFilter {
    functions: Vec<FilterFn>,
}

impl AnyMatchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function returning `true` for points to keep
    pub fn with_function(mut self, f: impl Fn(&RawPoint) -> bool + Send + Sync + 'static) -> Self {
        self.functions.push(Box::new(f));
        self
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl PermutationFilter for AnyMatchFilter {
    fn accept(&self, point: &RawPoint) -> bool {
        self.functions.iter().all(|f| f(point))
    }
}

impl fmt::Debug for AnyMatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyMatchFilter")
            .field("functions", &self.functions.len())
            .finish()
    }
}

/// Walker decorator that skips points rejected by a filter
pub struct FilteredWalker<W> {
    inner: W,
    filter: Arc<dyn PermutationFilter>,
}

impl<W> FilteredWalker<W> {
    pub fn new(inner: W, filter: impl PermutationFilter + 'static) -> Self {
        Self {
            inner,
            filter: Arc::new(filter),
        }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

impl<P, W> HyperSpaceWalker<P> for FilteredWalker<W>
where
    P: ModelParameters,
    W: HyperSpaceWalker<P>,
{
    fn iterator(&self) -> Box<dyn HyperSpaceIterator> {
        Box::new(FilteringIterator::new(
            self.inner.unbounded_iterator(),
            Arc::clone(&self.filter),
            self.inner.hyper_space_size(),
            self.inner.search_criteria().max_models(),
        ))
    }

    fn unbounded_iterator(&self) -> Box<dyn HyperSpaceIterator> {
        Box::new(FilteringIterator::new(
            self.inner.unbounded_iterator(),
            Arc::clone(&self.filter),
            self.inner.hyper_space_size(),
            0,
        ))
    }

    fn hyper_space_size(&self) -> u64 {
        self.inner.hyper_space_size()
    }

    fn hyper_param_names(&self) -> &[String] {
        self.inner.hyper_param_names()
    }

    fn base_params(&self) -> &P {
        self.inner.base_params()
    }

    fn params_builder(&self) -> &ParamsBuilder<P> {
        self.inner.params_builder()
    }

    fn search_criteria(&self) -> &SearchCriteria {
        self.inner.search_criteria()
    }
}

/// Iterator pulling from an inner iterator until a point passes the filter.
///
/// `visited` counts every pulled point, `used` only accepted ones. The
/// walk ends once `visited` reaches `max_visited`, so a filter rejecting
/// everything still terminates.
pub struct FilteringIterator {
    inner: Box<dyn HyperSpaceIterator>,
    filter: Arc<dyn PermutationFilter>,
    max_visited: u64,
    max_models: usize,
    visited: u64,
    used: usize,
    current: Option<RawPoint>,
}

impl FilteringIterator {
    pub fn new(
        inner: Box<dyn HyperSpaceIterator>,
        filter: Arc<dyn PermutationFilter>,
        max_visited: u64,
        max_models: usize,
    ) -> Self {
        Self {
            inner,
            filter,
            max_visited,
            max_models,
            visited: 0,
            used: 0,
            current: None,
        }
    }

    /// Points accepted and not returned by a failure
    pub fn used(&self) -> usize {
        self.used
    }
}

impl HyperSpaceIterator for FilteringIterator {
    fn has_next(&self) -> bool {
        self.visited < self.max_visited
            && (self.max_models == 0 || self.used < self.max_models)
            && self.inner.has_next()
    }

    fn next_point(&mut self) -> Option<RawPoint> {
        while self.has_next() {
            let point = self.inner.next_point()?;
            self.visited += 1;
            if self.filter.accept(&point) {
                self.used += 1;
                self.current = Some(point.clone());
                return Some(point);
            }
            tracing::trace!(point = %point, "Point rejected by filter");
        }
        None
    }

    fn on_failure(&mut self, point: &RawPoint) {
        self.visited = self.visited.saturating_sub(1);
        self.used = self.used.saturating_sub(1);
        self.inner.on_failure(point);
    }

    fn current_raw_parameters(&self) -> Option<RawPoint> {
        self.current.clone()
    }

    fn visited(&self) -> usize {
        self.visited as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FieldNaming;
    use crate::space::{HyperSpace, HyperValue};
    use crate::test_support::TreeParams;
    use crate::walker::{CartesianWalker, RandomWalker};

    fn depth(point: &RawPoint) -> i64 {
        match point.get("max_depth") {
            Some(HyperValue::Int(d)) => *d,
            _ => -1,
        }
    }

    fn depths(values: std::ops::RangeInclusive<i64>) -> CartesianWalker<TreeParams> {
        let space = HyperSpace::new().with_param("max_depth", values.collect::<Vec<_>>());
        CartesianWalker::new(TreeParams::default(), space, FieldNaming::Consistent).unwrap()
    }

    fn drain(mut it: Box<dyn HyperSpaceIterator>) -> Vec<RawPoint> {
        let mut out = Vec::new();
        while it.has_next() {
            if let Some(p) = it.next_point() {
                out.push(p);
            }
        }
        out
    }

    #[test]
    fn test_filter_skips_rejected_points() {
        let walker = FilteredWalker::new(depths(1..=10), |p: &RawPoint| depth(p) % 2 == 0);
        let points = drain(walker.iterator());
        assert_eq!(points.iter().map(depth).collect::<Vec<_>>(), vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_budget_with_half_rejected() {
        let space = HyperSpace::new().with_param("max_depth", (1..=10).collect::<Vec<i64>>());
        let inner = RandomWalker::new(
            TreeParams::default(),
            space,
            SearchCriteria::random_discrete(11).with_max_models(3),
            FieldNaming::Consistent,
        )
        .unwrap();
        let walker = FilteredWalker::new(inner, |p: &RawPoint| depth(p) <= 5);

        let mut it = walker.iterator();
        let mut accepted = Vec::new();
        while it.has_next() {
            if let Some(p) = it.next_point() {
                accepted.push(p);
            }
        }
        assert_eq!(accepted.len(), 3);
        assert!(accepted.iter().all(|p| depth(p) <= 5));
        assert!(it.visited() <= 10);
    }

    #[test]
    fn test_reject_all_terminates() {
        let walker = FilteredWalker::new(depths(1..=7), |_: &RawPoint| false);
        let mut it = walker.iterator();
        assert!(it.next_point().is_none());
        assert!(!it.has_next());
        assert_eq!(it.visited(), 7);
    }

    #[test]
    fn test_nested_filters_are_conjunctive() {
        let low = FilteredWalker::new(depths(1..=10), |p: &RawPoint| depth(p) <= 6);
        let both = FilteredWalker::new(low, |p: &RawPoint| depth(p) >= 3);
        let points = drain(both.iterator());
        assert_eq!(points.iter().map(depth).collect::<Vec<_>>(), vec![3, 4, 5, 6]);

        let opposite = FilteredWalker::new(
            FilteredWalker::new(depths(1..=10), |p: &RawPoint| depth(p) > 5),
            |p: &RawPoint| depth(p) <= 5,
        );
        assert!(drain(opposite.iterator()).is_empty());
    }

    #[test]
    fn test_failure_returns_slot() {
        let mut it = FilteringIterator::new(
            depths(1..=10).iterator(),
            Arc::new(|_: &RawPoint| true),
            10,
            2,
        );
        let first = it.next_point().unwrap();
        it.on_failure(&first);
        assert_eq!(it.used(), 0);
        assert!(it.next_point().is_some());
        assert!(it.next_point().is_some());
        assert!(!it.has_next());
    }

    #[test]
    fn test_any_match_filter() {
        let filter = AnyMatchFilter::new()
            .with_function(|p| depth(p) != 3)
            .with_function(|p| depth(p) != 5);
        let walker = FilteredWalker::new(depths(1..=6), filter);
        let points = drain(walker.iterator());
        assert_eq!(points.iter().map(depth).collect::<Vec<_>>(), vec![1, 2, 4, 6]);
    }
}

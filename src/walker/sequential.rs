//! Sequential walker over an explicit table of points

use std::sync::Arc;

use super::{HyperSpaceIterator, HyperSpaceWalker, WalkerCore};
use crate::criteria::SearchCriteria;
use crate::error::{GridError, Result};
use crate::params::{FieldNaming, ModelParameters, ParamsBuilder};
use crate::space::{HyperTable, RawPoint};

/// Walks the rows of a [`HyperTable`] in order.
#[derive(Debug, Clone)]
pub struct SequentialWalker<P> {
    core: WalkerCore<P>,
    table: Arc<HyperTable>,
    names: Arc<[String]>,
}

impl<P: ModelParameters> SequentialWalker<P> {
    pub fn new(
        base: P,
        table: HyperTable,
        criteria: SearchCriteria,
        naming: FieldNaming,
    ) -> Result<Self> {
        if !matches!(criteria, SearchCriteria::Sequential(_)) {
            return Err(GridError::SpaceConstruction(format!(
                "Sequential walker cannot run {} search",
                criteria.strategy()
            )));
        }
        table.validate()?;
        let names: Vec<String> = table.names().to_vec();
        let core = WalkerCore::new(base, names.clone(), criteria, naming)?;
        Ok(Self {
            core,
            table: Arc::new(table),
            names: names.into(),
        })
    }

    pub fn table(&self) -> &HyperTable {
        &self.table
    }
}

impl<P: ModelParameters> HyperSpaceWalker<P> for SequentialWalker<P> {
    fn iterator(&self) -> Box<dyn HyperSpaceIterator> {
        Box::new(SequentialIterator::new(
            Arc::clone(&self.table),
            Arc::clone(&self.names),
            self.core.criteria.max_models(),
        ))
    }

    fn unbounded_iterator(&self) -> Box<dyn HyperSpaceIterator> {
        Box::new(SequentialIterator::new(
            Arc::clone(&self.table),
            Arc::clone(&self.names),
            0,
        ))
    }

    fn hyper_space_size(&self) -> u64 {
        self.table.len() as u64
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

/// Cursor over the table rows
#[derive(Debug, Clone)]
pub struct SequentialIterator {
    table: Arc<HyperTable>,
    names: Arc<[String]>,
    cursor: usize,
    used: usize,
    max_models: usize,
    failed_rows: Vec<usize>,
}

impl SequentialIterator {
    pub fn new(table: Arc<HyperTable>, names: Arc<[String]>, max_models: usize) -> Self {
        Self {
            table,
            names,
            cursor: 0,
            used: 0,
            max_models,
            failed_rows: Vec::new(),
        }
    }

    /// Indices of the rows reported as failed, in failure order
    pub fn failed_rows(&self) -> &[usize] {
        &self.failed_rows
    }

    fn row_point(&self, idx: usize) -> RawPoint {
        RawPoint::new(Arc::clone(&self.names), self.table.rows()[idx].clone())
    }
}

impl HyperSpaceIterator for SequentialIterator {
    fn has_next(&self) -> bool {
        self.cursor < self.table.len() && (self.max_models == 0 || self.used < self.max_models)
    }

    fn next_point(&mut self) -> Option<RawPoint> {
        if !self.has_next() {
            return None;
        }
        let point = self.row_point(self.cursor);
        self.cursor += 1;
        self.used += 1;
        Some(point)
    }

    fn on_failure(&mut self, point: &RawPoint) {
        // Latest matching row at or before the cursor
        let row = self.table.rows()[..self.cursor]
            .iter()
            .rposition(|row| row.as_slice() == point.values());
        if let Some(row) = row {
            self.failed_rows.push(row);
        }
        self.used = self.used.saturating_sub(1);
    }

    fn current_raw_parameters(&self) -> Option<RawPoint> {
        self.cursor.checked_sub(1).map(|idx| self.row_point(idx))
    }

    fn visited(&self) -> usize {
        self.cursor
    }
}

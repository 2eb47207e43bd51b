//! Search facade over one partition.
//!
//! The engine validates a filter, annotates it with the optimizer and builds
//! the cursor tree. Callers drive the returned cursor themselves.

use tracing::{debug, instrument};

use dirdb_proto::ExprNode;

use super::builder::{CursorBuilder, EvaluatorBuilder};
use super::cursor::SearchCursor;
use super::evaluator::FilterEvaluator;
use super::optimizer::{Optimizer, PlanNode};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::storage::Partition;

/// Search engine for a partition.
pub struct SearchEngine<'a> {
    partition: &'a Partition,
    config: SearchConfig,
}

impl<'a> SearchEngine<'a> {
    /// Create an engine with the default configuration.
    pub fn new(partition: &'a Partition) -> Self {
        Self::with_config(partition, SearchConfig::default())
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(partition: &'a Partition, config: SearchConfig) -> Self {
        Self { partition, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Validate and annotate a filter without building cursors.
    pub fn plan<'f>(&self, filter: &'f ExprNode) -> Result<PlanNode<'f>> {
        filter.validate()?;
        Optimizer::new(self.partition).annotate(filter)
    }

    /// Build the cursor tree for a filter.
    ///
    /// The cursor is positioned before the first candidate.
    #[instrument(skip_all, fields(filter = %filter))]
    pub fn search<'f>(&self, filter: &'f ExprNode) -> Result<SearchCursor<'f>>
    where
        'a: 'f,
    {
        let plan = self.plan(filter)?;
        debug!(count = plan.count, indexed = plan.indexed, "planned search");
        CursorBuilder::new(self.partition, &self.config).build(&plan)
    }

    /// Build an evaluator for a filter.
    pub fn evaluator<'f>(&self, filter: &'f ExprNode) -> Result<FilterEvaluator<'f>>
    where
        'a: 'f,
    {
        filter.validate()?;
        EvaluatorBuilder::new(self.partition).build(filter)
    }
}

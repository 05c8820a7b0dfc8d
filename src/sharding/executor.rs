//! Sharded executor
//!
//! Every logical command walks the shards of a logical table in order and
//! goes through the same per-shard steps:
//!
//! 1. Classify the shard against the target range
//! 2. Skip it when the range misses it
//! 3. Build the boundary filter ANDed with the user filter
//! 4. Pick a strategy and collect the shard's records
//! 5. Accumulate into the logical result
//!
//! The commands themselves live in `count.rs`, `range_filter.rs` and
//! `select.rs`.

use tracing::debug;

use super::enumerator::{Shard, ShardEnumerator};
use super::errors::{ShardingError, ShardingResult};
use super::range::{CoverType, TargetRange};
use super::range_expression::RangeExpressionBuilder;
use crate::config::Config;
use crate::expr::{Expression, Operator};
use crate::optimizer::LogicalOptimizer;
use crate::scan::{BuildOptions, TableSelector};
use crate::storage::{Database, Order, RecordSet, Table};

/// Runs logical commands over the shards of a database.
pub struct ShardedExecutor<'a> {
    pub(super) db: &'a dyn Database,
    pub(super) config: Config,
}

impl<'a> ShardedExecutor<'a> {
    pub fn new(db: &'a dyn Database, config: Config) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shards of `logical_table` in `order`.
    pub(super) fn shards(
        &self,
        logical_table: &str,
        shard_key: &str,
        order: Order,
    ) -> ShardingResult<Vec<Shard>> {
        if shard_key.is_empty() {
            return Err(ShardingError::invalid_argument("shard_key is missing"));
        }
        ShardEnumerator::new(self.db, logical_table)?.enumerate(order)
    }

    /// Table of `shard` after checking it carries the shard key.
    pub(super) fn shard_table(&self, shard: &Shard, shard_key: &str) -> ShardingResult<&'a dyn Table> {
        let table = shard.table(self.db)?;
        if table.column(shard_key).is_none() {
            return Err(ShardingError::invalid_argument(format!(
                "shard_key doesn't exist: <{}.{}>",
                shard.table_name, shard_key
            )));
        }
        Ok(table)
    }

    /// Cover of `shard`, logged.
    pub(super) fn classify(&self, shard: &Shard, target: &TargetRange) -> CoverType {
        let cover = shard.range.cover_type(target);
        debug!(shard = %shard.table_name, cover = %cover, "SHARD_CLASSIFIED");
        cover
    }

    /// User filter as run against `table`, tree-optimized when configured.
    pub(super) fn shard_filter(
        &self,
        table: &dyn Table,
        filter: Option<&Expression>,
    ) -> ShardingResult<Option<Expression>> {
        match filter {
            Some(filter) if self.config.optimize_expressions => Ok(Some(
                LogicalOptimizer::with_estimates(self.db, table).optimize_expression(filter)?,
            )),
            Some(filter) => Ok(Some(filter.clone())),
            None => Ok(None),
        }
    }

    /// Boundary filter for `cover` ANDed with `filter`; `None` when the
    /// whole shard matches.
    pub(super) fn shard_expression(
        &self,
        shard_key: &str,
        target: &TargetRange,
        filter: Option<&Expression>,
        cover: CoverType,
    ) -> Option<Expression> {
        RangeExpressionBuilder::new(shard_key, target)
            .with_filter(filter)
            .build(cover)
    }

    /// Records of `table` matching `expr`, every record when `expr` is
    /// `None`.
    pub(super) fn select_records(
        &self,
        table: &dyn Table,
        expr: Option<&Expression>,
    ) -> ShardingResult<RecordSet> {
        match expr {
            None => Ok(RecordSet::from_ids(table.record_ids(), 1)),
            Some(expr) => Ok(self.selector(table).select(expr, None, Operator::Or)?),
        }
    }

    pub(super) fn selector<'t>(&'t self, table: &'t dyn Table) -> TableSelector<'t> {
        TableSelector::new(self.db, table).with_options(BuildOptions::from(&self.config))
    }
}

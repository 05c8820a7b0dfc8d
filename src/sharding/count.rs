//! `logical_count`

use tracing::instrument;

use super::errors::ShardingResult;
use super::executor::ShardedExecutor;
use super::range::{CoverType, TargetRange};
use crate::expr::Expression;
use crate::storage::Order;

/// Parameters of `logical_count`
#[derive(Debug, Clone, Default)]
pub struct CountRequest {
    pub logical_table: String,
    pub shard_key: String,
    pub target: TargetRange,
    pub filter: Option<Expression>,
}

impl CountRequest {
    pub fn new(logical_table: impl Into<String>, shard_key: impl Into<String>) -> Self {
        Self {
            logical_table: logical_table.into(),
            shard_key: shard_key.into(),
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: TargetRange) -> Self {
        self.target = target;
        self
    }

    pub fn with_filter(mut self, filter: Expression) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl ShardedExecutor<'_> {
    /// Number of records inside the target range matching the filter, over
    /// all shards.
    #[instrument(level = "info", skip_all, fields(logical_table = %request.logical_table))]
    pub fn logical_count(&self, request: &CountRequest) -> ShardingResult<usize> {
        let shards = self.shards(&request.logical_table, &request.shard_key, Order::Ascending)?;
        let mut total = 0;
        for shard in &shards {
            let cover = self.classify(shard, &request.target);
            if cover == CoverType::None {
                continue;
            }
            let table = self.shard_table(shard, &request.shard_key)?;
            let filter = self.shard_filter(table, request.filter.as_ref())?;
            total += match self.shard_expression(
                &request.shard_key,
                &request.target,
                filter.as_ref(),
                cover,
            ) {
                None => table.size(),
                Some(expr) => self.select_records(table, Some(&expr))?.len(),
            };
        }
        Ok(total)
    }
}

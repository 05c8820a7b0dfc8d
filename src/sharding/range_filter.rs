//! `logical_range_filter`
//!
//! Returns records in shard-key order, paging across shards without
//! materializing shards the page does not reach. Each shard is read either
//! by walking its shard-key index or by a filtered scan followed by a sort;
//! see [`super::strategy`].

use tracing::{debug, instrument, trace, warn};

use super::context::{normalize, ExecutionContext};
use super::enumerator::Shard;
use super::errors::ShardingResult;
use super::executor::ShardedExecutor;
use super::range::{CoverType, TargetRange};
use super::result::{default_output_columns, layout, project, RangeFilterResult};
use super::strategy::{max_unmatched, use_range_index};
use crate::expr::{Compiler, Evaluator, Expression, Operator};
use crate::scan::CardinalityEstimator;
use crate::storage::{Index, IndexKind, KeyRange, Order, ResultRow, Table, TableRow};
use crate::value::{RecordId, Value};

/// Parameters of `logical_range_filter`
#[derive(Debug, Clone)]
pub struct RangeFilterRequest {
    pub logical_table: String,
    pub shard_key: String,
    pub target: TargetRange,
    pub filter: Option<Expression>,
    pub order: Order,
    pub offset: usize,
    /// Negative keeps `total + limit + 1` records
    pub limit: i64,
    pub output_columns: Vec<String>,
    /// Per-query strategy override
    pub use_range_index: Option<bool>,
}

impl RangeFilterRequest {
    pub fn new(logical_table: impl Into<String>, shard_key: impl Into<String>) -> Self {
        Self {
            logical_table: logical_table.into(),
            shard_key: shard_key.into(),
            target: TargetRange::default(),
            filter: None,
            order: Order::Ascending,
            offset: 0,
            limit: 10,
            output_columns: default_output_columns(),
            use_range_index: None,
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

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn with_paging(mut self, offset: usize, limit: i64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn with_output_columns(mut self, columns: Vec<String>) -> Self {
        self.output_columns = columns;
        self
    }

    pub fn with_range_index(mut self, use_range_index: Option<bool>) -> Self {
        self.use_range_index = use_range_index;
        self
    }
}

/// Reasons to leave the index path for a filtered scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    /// The shard key has no range index
    IndexUnavailable,
    /// Too many walked records failed the filter
    ScanOverBudget { unmatched: usize, budget: usize },
}

enum IndexScan {
    Done(Vec<RecordId>),
    Fallback(Fallback),
}

impl ShardedExecutor<'_> {
    #[instrument(level = "info", skip_all, fields(logical_table = %request.logical_table))]
    pub fn logical_range_filter(
        &self,
        request: &RangeFilterRequest,
    ) -> ShardingResult<RangeFilterResult> {
        let shards = self.shards(&request.logical_table, &request.shard_key, request.order)?;
        let mut ctx = ExecutionContext::new(self.config.clone(), request.offset, request.limit)
            .with_range_index_override(request.use_range_index);

        let mut rows: Vec<ResultRow> = Vec::new();
        for shard in &shards {
            if ctx.is_satisfied() {
                break;
            }
            let cover = self.classify(shard, &request.target);
            if cover == CoverType::None {
                continue;
            }
            let table = self.shard_table(shard, &request.shard_key)?;
            let ids = self.filter_shard(&mut ctx, request, shard, table, cover)?;
            ctx.visited_shards.push(shard.table_name.clone());
            ctx.consume(ids.len());
            rows.extend(ids.into_iter().map(|id| ResultRow::from_table(table, id)));
        }

        if request.limit < 0 {
            let (start, count) = normalize(rows.len(), 0, request.limit);
            rows = rows.into_iter().skip(start).take(count).collect();
        }

        // Layout of the first shard, so empty results keep their columns
        let columns = match shards.first() {
            Some(first) => layout(first.table(self.db)?, &request.output_columns),
            None => Vec::new(),
        };
        Ok(RangeFilterResult {
            records: project(&rows, &columns),
            columns,
            visited_shards: ctx.visited_shards,
        })
    }

    /// Records one shard contributes to the page, in request order.
    fn filter_shard(
        &self,
        ctx: &mut ExecutionContext,
        request: &RangeFilterRequest,
        shard: &Shard,
        table: &dyn Table,
        cover: CoverType,
    ) -> ShardingResult<Vec<RecordId>> {
        let filter = self.shard_filter(table, request.filter.as_ref())?;
        let expr = self.shard_expression(&request.shard_key, &request.target, filter.as_ref(), cover);

        let chosen = use_range_index(ctx, table.size(), || match &expr {
            Some(expr) => CardinalityEstimator::new(self.db, table).estimate_expression(expr),
            None => table.size(),
        });
        if chosen {
            let outcome = match range_index(table, &request.shard_key) {
                Some(index) => self.index_scan(ctx, request, table, index, filter.as_ref(), cover)?,
                None => IndexScan::Fallback(Fallback::IndexUnavailable),
            };
            match outcome {
                IndexScan::Done(ids) => {
                    debug!(shard = %shard.table_name, n_records = ids.len(), "RANGE_INDEX_SCAN");
                    return Ok(ids);
                }
                IndexScan::Fallback(Fallback::IndexUnavailable) => {
                    trace!(shard = %shard.table_name, shard_key = %request.shard_key, "INDEX_UNAVAILABLE");
                }
                IndexScan::Fallback(Fallback::ScanOverBudget { unmatched, budget }) => {
                    warn!(shard = %shard.table_name, unmatched, budget, "RANGE_INDEX_OVER_BUDGET");
                }
            }
        }
        self.sequential_scan(ctx, request, table, expr.as_ref())
    }

    /// Walks the shard-key index in request order, evaluating the user
    /// filter per record.
    ///
    /// The context is only updated when the walk completes.
    fn index_scan(
        &self,
        ctx: &mut ExecutionContext,
        request: &RangeFilterRequest,
        table: &dyn Table,
        index: &dyn Index,
        filter: Option<&Expression>,
        cover: CoverType,
    ) -> ShardingResult<IndexScan> {
        let range = key_range(&request.target, cover, request.order);
        let node = filter.map(Compiler::compile).transpose()?;
        let limit = ctx.remaining();
        let budget = limit.map(|limit| max_unmatched(table.size(), limit, ctx.config.max_unmatched_ratio));

        let mut offset = ctx.current_offset;
        let mut unmatched = 0;
        let mut ids = Vec::new();
        for id in index.cursor(&range) {
            let matched = match &node {
                Some(node) => Evaluator::matches(node, &TableRow::with_database(self.db, table, id))?,
                None => true,
            };
            if !matched {
                unmatched += 1;
                if let Some(budget) = budget {
                    if unmatched > budget {
                        return Ok(IndexScan::Fallback(Fallback::ScanOverBudget { unmatched, budget }));
                    }
                }
                continue;
            }
            if offset > 0 {
                offset -= 1;
                continue;
            }
            ids.push(id);
            if Some(ids.len()) == limit {
                break;
            }
        }
        ctx.current_offset = offset;
        Ok(IndexScan::Done(ids))
    }

    /// Filters the whole shard, sorts by shard key and slices out the page.
    fn sequential_scan(
        &self,
        ctx: &mut ExecutionContext,
        request: &RangeFilterRequest,
        table: &dyn Table,
        expr: Option<&Expression>,
    ) -> ShardingResult<Vec<RecordId>> {
        let records = self.select_records(table, expr)?;
        // Records without a shard key have no position in key order
        let mut keyed: Vec<(Value, RecordId)> = records
            .ids()
            .filter_map(|id| match table.value(id, &request.shard_key) {
                Some(key) if !key.is_null() => Some((key, id)),
                _ => None,
            })
            .collect();
        let n_records = keyed.len();
        if ctx.current_offset >= n_records {
            ctx.current_offset -= n_records;
            return Ok(Vec::new());
        }

        keyed.sort_by(|(a_key, a_id), (b_key, b_id)| {
            let by_key = match request.order {
                Order::Ascending => a_key.cmp(b_key),
                Order::Descending => b_key.cmp(a_key),
            };
            by_key.then(a_id.cmp(b_id))
        });

        let start = ctx.current_offset;
        ctx.current_offset = 0;
        let page = keyed.into_iter().skip(start).map(|(_, id)| id);
        Ok(match ctx.remaining() {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        })
    }
}

fn range_index<'t>(table: &'t dyn Table, shard_key: &str) -> Option<&'t dyn Index> {
    table
        .index(shard_key, Operator::Less)
        .filter(|index| index.kind() == IndexKind::Range)
}

/// Cursor range for the bounds of `target` falling inside the shard.
fn key_range(target: &TargetRange, cover: CoverType, order: Order) -> KeyRange {
    let mut range = KeyRange::all().with_order(order);
    if matches!(cover, CoverType::PartialMin | CoverType::PartialMinAndMax) {
        if let Some(min) = target.min {
            range = range.with_min(Value::Time(min), target.min_border);
        }
    }
    if matches!(cover, CoverType::PartialMax | CoverType::PartialMinAndMax) {
        if let Some(max) = target.max {
            range = range.with_max(Value::Time(max), target.max_border);
        }
    }
    range
}

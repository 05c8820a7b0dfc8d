//! `logical_select`
//!
//! Unlike `logical_range_filter`, select reports the total hit count and
//! may sort on any column, so every covered shard is filtered in full.
//! Paging without sort keys still walks shards in order and materializes
//! only the requested page.

use tracing::{debug, instrument};

use super::context::normalize;
use super::drilldown::{execute_drilldowns, DrilldownSpec};
use super::errors::ShardingResult;
use super::executor::ShardedExecutor;
use super::range::{CoverType, TargetRange};
use super::result::{default_output_columns, layout, project, SelectResult, SCORE_COLUMN};
use super::sorter::{ResultSorter, SortKey};
use crate::expr::Expression;
use crate::storage::{Order, RecordSet, ResultRow, Table};
use crate::value::Value;

/// Parameters of `logical_select`
#[derive(Debug, Clone)]
pub struct SelectRequest {
    pub logical_table: String,
    pub shard_key: String,
    pub target: TargetRange,
    pub filter: Option<Expression>,
    pub sort_keys: Vec<SortKey>,
    /// Negative counts from the end
    pub offset: i64,
    /// Negative keeps `n_hits + limit + 1` records
    pub limit: i64,
    pub output_columns: Vec<String>,
    pub drilldowns: Vec<DrilldownSpec>,
}

impl SelectRequest {
    pub fn new(logical_table: impl Into<String>, shard_key: impl Into<String>) -> Self {
        Self {
            logical_table: logical_table.into(),
            shard_key: shard_key.into(),
            target: TargetRange::default(),
            filter: None,
            sort_keys: Vec::new(),
            offset: 0,
            limit: 10,
            output_columns: default_output_columns(),
            drilldowns: Vec::new(),
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

    pub fn with_sort_keys(mut self, sort_keys: Vec<SortKey>) -> Self {
        self.sort_keys = sort_keys;
        self
    }

    pub fn with_paging(mut self, offset: i64, limit: i64) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub fn with_output_columns(mut self, columns: Vec<String>) -> Self {
        self.output_columns = columns;
        self
    }

    pub fn with_drilldown(mut self, drilldown: DrilldownSpec) -> Self {
        self.drilldowns.push(drilldown);
        self
    }
}

impl ShardedExecutor<'_> {
    #[instrument(level = "info", skip_all, fields(logical_table = %request.logical_table))]
    pub fn logical_select(&self, request: &SelectRequest) -> ShardingResult<SelectResult> {
        let shards = self.shards(&request.logical_table, &request.shard_key, Order::Ascending)?;

        let mut hits: Vec<(&dyn Table, RecordSet)> = Vec::new();
        for shard in &shards {
            let cover = self.classify(shard, &request.target);
            if cover == CoverType::None {
                continue;
            }
            let table = self.shard_table(shard, &request.shard_key)?;
            let filter = self.shard_filter(table, request.filter.as_ref())?;
            let expr = self.shard_expression(&request.shard_key, &request.target, filter.as_ref(), cover);
            let records = self.select_records(table, expr.as_ref())?;
            debug!(shard = %shard.table_name, n_hits = records.len(), "SHARD_SELECTED");
            if !records.is_empty() {
                hits.push((table, records));
            }
        }
        let n_hits = hits.iter().map(|(_, records)| records.len()).sum();

        let rows = || {
            hits.iter().flat_map(|(table, records)| {
                records.iter().map(move |(id, score)| {
                    let mut row = ResultRow::from_table(*table, id);
                    row.set(SCORE_COLUMN, Value::Int(i64::from(score)));
                    row
                })
            })
        };
        let (start, count) = normalize(n_hits, request.offset, request.limit);
        let page: Vec<ResultRow> = if request.sort_keys.is_empty() {
            rows().skip(start).take(count).collect()
        } else {
            let mut all: Vec<ResultRow> = rows().collect();
            ResultSorter::sort(&mut all, &request.sort_keys);
            all.into_iter().skip(start).take(count).collect()
        };

        let drilldowns = if request.drilldowns.is_empty() {
            Vec::new()
        } else {
            let all: Vec<ResultRow> = rows().collect();
            execute_drilldowns(&all, &request.drilldowns)?
        };

        let columns = match shards.first() {
            Some(first) => layout(first.table(self.db)?, &request.output_columns),
            None => Vec::new(),
        };
        Ok(SelectResult {
            n_hits,
            records: project(&page, &columns),
            columns,
            drilldowns,
        })
    }
}

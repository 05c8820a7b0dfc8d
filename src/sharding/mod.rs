//! Sharded execution
//!
//! A logical table is the union of physical tables named
//! `<logical>_YYYYMM` or `<logical>_YYYYMMDD`, each holding one month or
//! one day of a time-valued shard key. This module answers three logical
//! commands over those shards:
//!
//! - `logical_count`: records inside a time range matching a filter
//! - `logical_range_filter`: records in shard-key order with offset/limit
//! - `logical_select`: paginated, optionally sorted records plus drilldowns
//!
//! # Design Principles
//!
//! - Shards are visited in enumeration order, one at a time
//! - A shard the target range misses is never opened
//! - A fully covered shard without a filter is taken without evaluation
//! - Index-assisted reads fall back to filtered scans, never to errors
//!
//! # Invariants
//!
//! - Every shard classifies into exactly one cover type
//! - Offset debt and the remaining limit only shrink while shards are read
//! - Results carry the first shard's layout even when empty

mod context;
mod count;
mod drilldown;
mod enumerator;
mod errors;
mod executor;
mod range;
mod range_expression;
mod range_filter;
mod result;
mod select;
mod sorter;
mod strategy;

pub use context::{normalize, ExecutionContext, Paging};
pub use count::CountRequest;
pub use drilldown::{
    execute_drilldowns, topological_order, CalcType, DrilldownSpec,
    DEFAULT_DRILLDOWN_OUTPUT_COLUMNS,
};
pub use enumerator::{parse_shard_key, windows, Shard, ShardEnumerator};
pub use errors::{ShardingError, ShardingResult};
pub use executor::ShardedExecutor;
pub use range::{CoverType, ShardRange, TargetRange};
pub use range_expression::RangeExpressionBuilder;
pub use range_filter::RangeFilterRequest;
pub use result::{
    layout, project, ColumnSpec, DrilldownResult, RangeFilterResult, SelectResult,
    DEFAULT_OUTPUT_COLUMNS, NSUBRECS_COLUMN, SCORE_COLUMN,
};
pub use select::SelectRequest;
pub use sorter::{ResultSorter, SortDirection, SortKey};
pub use strategy::{max_unmatched, use_range_index};

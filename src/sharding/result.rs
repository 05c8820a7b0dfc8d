//! Result types for logical commands

use serde::Serialize;

use crate::storage::{ResultRow, Table, ID_COLUMN, KEY_COLUMN};
use crate::value::{Value, ValueType};

/// Pseudo column holding a record's accumulated score.
pub const SCORE_COLUMN: &str = "_score";
/// Pseudo column holding the number of records grouped into a drilldown row.
pub const NSUBRECS_COLUMN: &str = "_nsubrecs";
/// `output_columns` of `logical_range_filter` and `logical_select` when
/// none are given.
pub const DEFAULT_OUTPUT_COLUMNS: &[&str] = &["_id", "_key", "*"];

pub(super) fn default_output_columns() -> Vec<String> {
    DEFAULT_OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Name and type of one output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    /// `None` when the type cannot be told, such as keys of keyed tables
    pub value_type: Option<ValueType>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, value_type: Option<ValueType>) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }

    /// Column typed after the first non-null value of `rows`.
    pub fn infer(name: &str, rows: &[ResultRow]) -> Self {
        let value_type = rows
            .iter()
            .filter_map(|r| r.values.get(name))
            .find_map(Value::value_type);
        Self::new(name, value_type)
    }
}

/// Output layout of `table` for `output_columns`.
///
/// `*` expands to every stored column. `_key` only exists on keyed tables;
/// unknown names are dropped.
pub fn layout(table: &dyn Table, output_columns: &[String]) -> Vec<ColumnSpec> {
    let mut columns = Vec::new();
    for name in output_columns {
        match name.as_str() {
            "*" => columns.extend(
                table
                    .columns()
                    .iter()
                    .map(|c| ColumnSpec::new(c.name.clone(), Some(c.value_type))),
            ),
            ID_COLUMN | SCORE_COLUMN => columns.push(ColumnSpec::new(name.clone(), Some(ValueType::Int))),
            KEY_COLUMN if table.is_keyed() => columns.push(ColumnSpec::new(name.clone(), None)),
            KEY_COLUMN => {}
            _ => {
                if let Some(info) = table.column(name) {
                    columns.push(ColumnSpec::new(name.clone(), Some(info.value_type)));
                }
            }
        }
    }
    columns
}

/// Values of `columns` for every row, in row order.
pub fn project(rows: &[ResultRow], columns: &[ColumnSpec]) -> Vec<Vec<Value>> {
    let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
    rows.iter().map(|row| row.project(&names)).collect()
}

/// Result of `logical_range_filter`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeFilterResult {
    pub columns: Vec<ColumnSpec>,
    pub records: Vec<Vec<Value>>,
    /// Shards whose records were read, in visiting order
    #[serde(skip)]
    pub visited_shards: Vec<String>,
}

impl RangeFilterResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One grouped facet of `logical_select`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrilldownResult {
    pub label: String,
    /// Groups left after the drilldown's filter, before paging
    pub n_hits: usize,
    pub columns: Vec<ColumnSpec>,
    pub records: Vec<Vec<Value>>,
}

/// Result of `logical_select`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectResult {
    /// Matching records over all shards, before paging
    pub n_hits: usize,
    pub columns: Vec<ColumnSpec>,
    pub records: Vec<Vec<Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drilldowns: Vec<DrilldownResult>,
}

impl SelectResult {
    pub fn drilldown(&self, label: &str) -> Option<&DrilldownResult> {
        self.drilldowns.iter().find(|d| d.label == label)
    }
}

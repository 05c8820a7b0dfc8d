//! Drilldowns
//!
//! A drilldown groups rows by one or more key columns and reports, per
//! group, the key, the number of grouped rows and optional aggregates of a
//! target column. A labeled drilldown may group another drilldown's groups
//! instead of the select hits; such dependencies run in topological order.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::context::Paging;
use super::errors::{ShardingError, ShardingResult};
use super::result::{project, ColumnSpec, DrilldownResult, NSUBRECS_COLUMN};
use super::sorter::{ResultSorter, SortKey};
use crate::expr::{Compiler, Evaluator, Expression};
use crate::storage::{ResultRow, RowAccess, ID_COLUMN, KEY_COLUMN};
use crate::value::Value;

/// Default `output_columns` of a drilldown
pub const DEFAULT_DRILLDOWN_OUTPUT_COLUMNS: &[&str] = &[KEY_COLUMN, NSUBRECS_COLUMN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CalcType {
    Count,
    Max,
    Min,
    Sum,
    Avg,
}

impl CalcType {
    /// Output column holding the aggregate.
    pub fn column(&self) -> &'static str {
        match self {
            CalcType::Count => NSUBRECS_COLUMN,
            CalcType::Max => "_max",
            CalcType::Min => "_min",
            CalcType::Sum => "_sum",
            CalcType::Avg => "_avg",
        }
    }

    /// Parses a `|` or `,` separated list such as `MAX|SUM`.
    pub fn parse_list(text: &str) -> ShardingResult<Vec<CalcType>> {
        text.split(['|', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(CalcType::from_str)
            .collect()
    }
}

impl FromStr for CalcType {
    type Err = ShardingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COUNT" => Ok(CalcType::Count),
            "MAX" => Ok(CalcType::Max),
            "MIN" => Ok(CalcType::Min),
            "SUM" => Ok(CalcType::Sum),
            "AVG" => Ok(CalcType::Avg),
            _ => Err(ShardingError::invalid_argument(format!(
                "unknown calc type: <{}>",
                s
            ))),
        }
    }
}

/// One drilldown of `logical_select`
#[derive(Debug, Clone)]
pub struct DrilldownSpec {
    pub label: String,
    pub keys: Vec<String>,
    pub calc_types: Vec<CalcType>,
    pub calc_target: Option<String>,
    /// Applied to the groups before sorting
    pub filter: Option<Expression>,
    pub sort_keys: Vec<SortKey>,
    pub output_columns: Vec<String>,
    pub paging: Paging,
    /// Label of the drilldown whose groups this one groups
    pub table: Option<String>,
}

impl DrilldownSpec {
    pub fn new(label: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            label: label.into(),
            keys,
            calc_types: Vec::new(),
            calc_target: None,
            filter: None,
            sort_keys: Vec::new(),
            output_columns: DEFAULT_DRILLDOWN_OUTPUT_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            paging: Paging::default(),
            table: None,
        }
    }

    pub fn with_calc(mut self, calc_types: Vec<CalcType>, target: impl Into<String>) -> Self {
        self.calc_types = calc_types;
        self.calc_target = Some(target.into());
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

    pub fn with_output_columns(mut self, columns: Vec<String>) -> Self {
        self.output_columns = columns;
        self
    }

    pub fn with_paging(mut self, offset: i64, limit: i64) -> Self {
        self.paging = Paging { offset, limit };
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// Runs `specs` over `rows`; results come back in declaration order.
pub fn execute_drilldowns(
    rows: &[ResultRow],
    specs: &[DrilldownSpec],
) -> ShardingResult<Vec<DrilldownResult>> {
    let order = topological_order(specs)?;
    let labels: HashMap<&str, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| (s.label.as_str(), i))
        .collect();

    let mut groups: Vec<Option<Vec<ResultRow>>> = vec![None; specs.len()];
    let mut results: Vec<Option<DrilldownResult>> = vec![None; specs.len()];
    for i in order {
        let spec = &specs[i];
        let source: &[ResultRow] = match &spec.table {
            None => rows,
            Some(label) => labels
                .get(label.as_str())
                .and_then(|j| groups[*j].as_deref())
                .ok_or_else(|| {
                    ShardingError::invalid_argument(format!("unknown drilldown: <{}>", label))
                })?,
        };
        let grouped = group(source, spec)?;
        results[i] = Some(finish(spec, grouped.clone())?);
        groups[i] = Some(grouped);
    }
    Ok(results.into_iter().flatten().collect())
}

/// Drilldown indexes, every drilldown after the one it groups.
///
/// Unknown labels, duplicated labels and cycles are invalid.
pub fn topological_order(specs: &[DrilldownSpec]) -> ShardingResult<Vec<usize>> {
    let mut labels: HashMap<&str, usize> = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
        if labels.insert(spec.label.as_str(), i).is_some() {
            return Err(ShardingError::invalid_argument(format!(
                "duplicated drilldown label: <{}>",
                spec.label
            )));
        }
    }

    let mut in_degree = vec![0usize; specs.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
    for (i, spec) in specs.iter().enumerate() {
        if let Some(table) = &spec.table {
            let source = labels.get(table.as_str()).ok_or_else(|| {
                ShardingError::invalid_argument(format!("unknown drilldown: <{}>", table))
            })?;
            in_degree[i] += 1;
            dependents[*source].push(i);
        }
    }

    let mut ready: VecDeque<usize> = (0..specs.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(specs.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        for dependent in &dependents[i] {
            in_degree[*dependent] -= 1;
            if in_degree[*dependent] == 0 {
                ready.push_back(*dependent);
            }
        }
    }
    if order.len() < specs.len() {
        let cyclic: Vec<&str> = (0..specs.len())
            .filter(|i| in_degree[*i] > 0)
            .map(|i| specs[i].label.as_str())
            .collect();
        return Err(ShardingError::invalid_argument(format!(
            "drilldown dependency cycle: <{}>",
            cyclic.join(", ")
        )));
    }
    Ok(order)
}

#[derive(Debug, Default)]
struct Aggregate {
    n_subrecs: i64,
    max: Option<Value>,
    min: Option<Value>,
    /// Exact sum while every value is an integer
    int_sum: i128,
    sum: f64,
    all_int: bool,
}

impl Aggregate {
    fn new() -> Self {
        Self {
            all_int: true,
            ..Self::default()
        }
    }

    fn add(&mut self, target: Option<Value>) {
        self.n_subrecs += 1;
        let value = match target {
            Some(value) if value.as_f64().is_some() => value,
            _ => return,
        };
        self.sum += value.as_f64().unwrap_or(0.0);
        match &value {
            Value::Int(n) => self.int_sum += i128::from(*n),
            _ => self.all_int = false,
        }
        if self.max.as_ref().map_or(true, |max| value > *max) {
            self.max = Some(value.clone());
        }
        if self.min.as_ref().map_or(true, |min| value < *min) {
            self.min = Some(value);
        }
    }

    fn value(&self, calc: CalcType) -> Value {
        match calc {
            CalcType::Count => Value::Int(self.n_subrecs),
            CalcType::Max => self.max.clone().unwrap_or(Value::Null),
            CalcType::Min => self.min.clone().unwrap_or(Value::Null),
            CalcType::Sum if self.all_int => match i64::try_from(self.int_sum) {
                Ok(sum) => Value::Int(sum),
                Err(_) => Value::Float(self.int_sum as f64),
            },
            CalcType::Sum => Value::Float(self.sum),
            CalcType::Avg if self.n_subrecs == 0 => Value::Null,
            CalcType::Avg if self.all_int => Value::Float(self.int_sum as f64 / self.n_subrecs as f64),
            CalcType::Avg => Value::Float(self.sum / self.n_subrecs as f64),
        }
    }
}

/// Groups `source` by the drilldown keys, in first-seen order.
fn group(source: &[ResultRow], spec: &DrilldownSpec) -> ShardingResult<Vec<ResultRow>> {
    if spec.keys.is_empty() {
        return Err(ShardingError::invalid_argument(format!(
            "drilldown keys are missing: <{}>",
            spec.label
        )));
    }

    let mut positions: BTreeMap<Vec<Value>, usize> = BTreeMap::new();
    let mut groups: Vec<(Vec<Value>, Aggregate)> = Vec::new();
    for row in source {
        let key: Vec<Value> = spec
            .keys
            .iter()
            .map(|k| row.value(k).unwrap_or(Value::Null))
            .collect();
        let position = match positions.get(&key) {
            Some(position) => *position,
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, Aggregate::new()));
                groups.len() - 1
            }
        };
        let target = spec.calc_target.as_deref().and_then(|t| row.value(t));
        groups[position].1.add(target);
    }

    let rows = groups
        .into_iter()
        .zip(1u32..)
        .map(|((key, aggregate), id)| {
            let mut row = ResultRow::new(spec.label.clone(), id);
            row.set(KEY_COLUMN, group_key(&key));
            for (name, value) in spec.keys.iter().zip(key) {
                row.set(name.clone(), value);
            }
            row.set(NSUBRECS_COLUMN, aggregate.value(CalcType::Count));
            if spec.calc_target.is_some() {
                for calc in &spec.calc_types {
                    row.set(calc.column(), aggregate.value(*calc));
                }
            }
            row
        })
        .collect();
    Ok(rows)
}

/// `_key` of a group: the value itself, or the values joined for multi-key
/// groups.
fn group_key(key: &[Value]) -> Value {
    match key {
        [single] => single.clone(),
        _ => Value::Text(
            key.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ),
    }
}

/// Filters, sorts, pages and projects grouped rows.
fn finish(spec: &DrilldownSpec, mut rows: Vec<ResultRow>) -> ShardingResult<DrilldownResult> {
    if let Some(filter) = &spec.filter {
        let node = Compiler::compile(filter)?;
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if Evaluator::matches(&node, &row)? {
                kept.push(row);
            }
        }
        rows = kept;
    }
    let n_hits = rows.len();
    ResultSorter::sort(&mut rows, &spec.sort_keys);
    let rows = spec.paging.apply(rows);

    let columns: Vec<ColumnSpec> = output_names(spec)
        .into_iter()
        .map(|name| ColumnSpec::infer(&name, &rows))
        .collect();
    Ok(DrilldownResult {
        label: spec.label.clone(),
        n_hits,
        records: project(&rows, &columns),
        columns,
    })
}

/// Requested output columns that grouped rows can carry; `*` stands for the
/// key columns.
fn output_names(spec: &DrilldownSpec) -> Vec<String> {
    let mut available: Vec<String> = vec![
        ID_COLUMN.to_string(),
        KEY_COLUMN.to_string(),
        NSUBRECS_COLUMN.to_string(),
    ];
    available.extend(spec.keys.iter().cloned());
    if spec.calc_target.is_some() {
        available.extend(spec.calc_types.iter().map(|c| c.column().to_string()));
    }

    let mut names = Vec::new();
    for name in &spec.output_columns {
        if name == "*" {
            names.extend(spec.keys.iter().cloned());
        } else if available.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

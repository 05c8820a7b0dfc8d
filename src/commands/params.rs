//! Textual command parameters
//!
//! Parameters arrive as name/value strings. Filters are passed separately
//! as built expressions, keyed `filter` or `drilldowns[LABEL].filter`.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::config::parse_flag;
use crate::expr::Expression;
use crate::sharding::{
    CalcType, CountRequest, DrilldownSpec, RangeFilterRequest, SelectRequest, ShardingError,
    ShardingResult, SortKey, TargetRange,
};
use crate::storage::{Border, Order};
use crate::value::parse_time;

/// Parameters of one command invocation.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: BTreeMap<String, String>,
    expressions: BTreeMap<String, Expression>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn with_expression(mut self, name: impl Into<String>, expr: Expression) -> Self {
        self.expressions.insert(name.into(), expr);
        self
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn expression(&self, name: &str) -> Option<&Expression> {
        self.expressions.get(name)
    }

    pub fn required(&self, name: &str) -> ShardingResult<&str> {
        self.get(name)
            .ok_or_else(|| ShardingError::invalid_argument(format!("{} is missing", name)))
    }

    pub fn int(&self, name: &str, default: i64) -> ShardingResult<i64> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                ShardingError::invalid_argument(format!("{} must be an integer: <{}>", name, raw))
            }),
        }
    }

    pub fn time(&self, name: &str) -> ShardingResult<Option<NaiveDateTime>> {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => parse_time(raw).map(Some).ok_or_else(|| {
                ShardingError::invalid_argument(format!("{} must be a time: <{}>", name, raw))
            }),
        }
    }

    /// Value parsed with `FromStr`, `default` when absent.
    pub fn parsed<T>(&self, name: &str, default: T) -> ShardingResult<T>
    where
        T: FromStr<Err = String>,
    {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e| ShardingError::invalid_argument(format!("{}: {}", name, e))),
        }
    }

    /// `yes`/`no` style flag, `None` when absent.
    pub fn flag(&self, name: &str) -> ShardingResult<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(raw) => parse_flag(raw).map(Some).ok_or_else(|| {
                ShardingError::invalid_argument(format!("{} must be yes or no: <{}>", name, raw))
            }),
        }
    }

    /// Comma separated list, blank entries dropped.
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        self.get(name).map(split_list)
    }

    pub fn target_range(&self) -> ShardingResult<TargetRange> {
        Ok(TargetRange {
            min: self.time("min")?,
            min_border: self.parsed("min_border", Border::Include)?,
            max: self.time("max")?,
            max_border: self.parsed("max_border", Border::Include)?,
        })
    }

    /// Unlabeled `drilldown` keys first, one drilldown per key, then the
    /// labeled `drilldowns[LABEL].*` groups in label order.
    pub fn drilldowns(&self) -> ShardingResult<Vec<DrilldownSpec>> {
        let mut specs = Vec::new();
        if let Some(keys) = self.list("drilldown") {
            for key in keys {
                specs.push(self.drilldown_spec(key.clone(), vec![key], |name| {
                    format!("drilldown_{}", name)
                })?);
            }
        }
        for label in self.drilldown_labels() {
            let prefix = format!("drilldowns[{}].", label);
            let keys = self.list(&format!("{}keys", prefix)).unwrap_or_default();
            specs.push(self.drilldown_spec(label, keys, |name| format!("{}{}", prefix, name))?);
        }
        Ok(specs)
    }

    fn drilldown_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .values
            .keys()
            .chain(self.expressions.keys())
            .filter_map(|name| {
                let captures = labeled_drilldown_pattern()?.captures(name)?;
                Some(captures.get(1)?.as_str().to_string())
            })
            .collect();
        labels.sort();
        labels.dedup();
        labels
    }

    fn drilldown_spec(
        &self,
        label: String,
        keys: Vec<String>,
        name: impl Fn(&str) -> String,
    ) -> ShardingResult<DrilldownSpec> {
        let mut spec = DrilldownSpec::new(label, keys);
        if let Some(raw) = self.get(&name("calc_types")) {
            spec.calc_types = CalcType::parse_list(raw)?;
        }
        spec.calc_target = self.get(&name("calc_target")).map(str::to_string);
        spec.filter = self.expression(&name("filter")).cloned();
        if let Some(raw) = self.get(&name("sort_keys")) {
            spec.sort_keys = SortKey::parse_list(raw);
        }
        if let Some(columns) = self.list(&name("output_columns")) {
            spec.output_columns = columns;
        }
        spec.paging.offset = self.int(&name("offset"), spec.paging.offset)?;
        spec.paging.limit = self.int(&name("limit"), spec.paging.limit)?;
        spec.table = self.get(&name("table")).map(str::to_string);
        Ok(spec)
    }
}

fn labeled_drilldown_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^drilldowns\[([^\]]+)\]\.[a-z_]+$").ok())
        .as_ref()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn count_request(params: &Params) -> ShardingResult<CountRequest> {
    Ok(CountRequest {
        logical_table: params.required("logical_table")?.to_string(),
        shard_key: params.required("shard_key")?.to_string(),
        target: params.target_range()?,
        filter: params.expression("filter").cloned(),
    })
}

pub fn range_filter_request(params: &Params) -> ShardingResult<RangeFilterRequest> {
    let mut request = RangeFilterRequest::new(
        params.required("logical_table")?,
        params.required("shard_key")?,
    );
    request.target = params.target_range()?;
    request.filter = params.expression("filter").cloned();
    request.order = params.parsed("order", Order::Ascending)?;
    let offset = params.int("offset", 0)?;
    request.offset = usize::try_from(offset).map_err(|_| {
        ShardingError::invalid_argument(format!("offset must not be negative: <{}>", offset))
    })?;
    request.limit = params.int("limit", request.limit)?;
    if let Some(columns) = params.list("output_columns") {
        request.output_columns = columns;
    }
    request.use_range_index = params.flag("use_range_index")?;
    Ok(request)
}

pub fn select_request(params: &Params) -> ShardingResult<SelectRequest> {
    let mut request = SelectRequest::new(
        params.required("logical_table")?,
        params.required("shard_key")?,
    );
    request.target = params.target_range()?;
    request.filter = params.expression("filter").cloned();
    if let Some(raw) = params.get("sort_keys") {
        request.sort_keys = SortKey::parse_list(raw);
    }
    request.offset = params.int("offset", request.offset)?;
    request.limit = params.int("limit", request.limit)?;
    if let Some(columns) = params.list("output_columns") {
        request.output_columns = columns;
    }
    request.drilldowns = params.drilldowns()?;
    Ok(request)
}

//! Key ranges for lexicon and index cursors

use std::fmt;
use std::ops::Bound;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Whether a range endpoint is part of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Border {
    #[default]
    Include,
    Exclude,
}

impl Border {
    pub fn as_str(&self) -> &'static str {
        match self {
            Border::Include => "include",
            Border::Exclude => "exclude",
        }
    }
}

impl FromStr for Border {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "include" => Ok(Border::Include),
            "exclude" => Ok(Border::Exclude),
            other => Err(format!(
                "border must be \"include\" or \"exclude\": <{}>",
                other
            )),
        }
    }
}

impl fmt::Display for Border {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Ascending => "ascending",
            Order::Descending => "descending",
        }
    }
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" => Ok(Order::Ascending),
            "descending" => Ok(Order::Descending),
            other => Err(format!(
                "order must be \"ascending\" or \"descending\": <{}>",
                other
            )),
        }
    }
}

/// Key range with optional endpoints, or a text prefix.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyRange {
    pub min: Option<Value>,
    pub min_border: Border,
    pub max: Option<Value>,
    pub max_border: Border,
    pub prefix: Option<String>,
    pub order: Order,
}

impl KeyRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn with_min(mut self, value: Value, border: Border) -> Self {
        self.min = Some(value);
        self.min_border = border;
        self
    }

    pub fn with_max(mut self, value: Value, border: Border) -> Self {
        self.max = Some(value);
        self.max_border = border;
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Lower bound for `BTreeMap::range`.
    pub fn lower_bound(&self) -> Bound<&Value> {
        match (&self.min, self.min_border) {
            (Some(v), Border::Include) => Bound::Included(v),
            (Some(v), Border::Exclude) => Bound::Excluded(v),
            (None, _) => Bound::Unbounded,
        }
    }

    /// Upper bound for `BTreeMap::range`.
    pub fn upper_bound(&self) -> Bound<&Value> {
        match (&self.max, self.max_border) {
            (Some(v), Border::Include) => Bound::Included(v),
            (Some(v), Border::Exclude) => Bound::Excluded(v),
            (None, _) => Bound::Unbounded,
        }
    }

    /// True when no key can satisfy both endpoints.
    pub fn is_empty(&self) -> bool {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => match min.cmp(max) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => {
                    self.min_border == Border::Exclude || self.max_border == Border::Exclude
                }
                std::cmp::Ordering::Less => false,
            },
            _ => false,
        }
    }

    pub fn contains(&self, key: &Value) -> bool {
        if let Some(prefix) = &self.prefix {
            return key.as_text().is_some_and(|k| k.starts_with(prefix.as_str()));
        }
        let above_min = match (&self.min, self.min_border) {
            (Some(min), Border::Include) => key >= min,
            (Some(min), Border::Exclude) => key > min,
            (None, _) => true,
        };
        let below_max = match (&self.max, self.max_border) {
            (Some(max), Border::Include) => key <= max,
            (Some(max), Border::Exclude) => key < max,
            (None, _) => true,
        };
        above_min && below_max
    }
}

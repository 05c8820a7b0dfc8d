//! Result sorting
//!
//! Sorts rows by one or more columns, deterministically.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::storage::RowAccess;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One column of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses `column` or `-column` (descending).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.strip_prefix('-') {
            Some(column) if !column.trim().is_empty() => Some(Self::desc(column.trim())),
            Some(_) => None,
            None if text.is_empty() => None,
            None => Some(Self::asc(text)),
        }
    }

    /// Parses a comma separated list, skipping blank entries.
    pub fn parse_list(text: &str) -> Vec<Self> {
        text.split(',').filter_map(Self::parse).collect()
    }
}

/// Sorts rows of results and drilldowns
pub struct ResultSorter;

impl ResultSorter {
    /// Sorts `rows` by `keys`, earlier keys first.
    ///
    /// Sort is stable: rows equal on every key keep their order.
    pub fn sort<R: RowAccess>(rows: &mut [R], keys: &[SortKey]) {
        if keys.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for key in keys {
                let ordering = Self::compare_values(a.value(&key.column), b.value(&key.column));
                let ordering = match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Missing values sort first, then the total order of [`Value`].
    fn compare_values(a: Option<Value>, b: Option<Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }
}

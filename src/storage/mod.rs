//! Table and index access
//!
//! The query layer never owns storage. It reaches tables, columns and
//! indexes through the traits in this module:
//!
//! - [`Database`] enumerates tables by name
//! - [`Table`] exposes records, column values and per-column indexes
//! - [`Index`] answers term lookups, range cursors and size estimates
//!
//! [`memory`] provides an in-memory implementation built on ordered maps.
//!
//! # Invariants
//!
//! - Record ids are stable for the life of a table
//! - Index cursors yield ids in key order, ties by ascending id
//! - Lexicon cursors yield distinct keys in key order

mod cursor;
mod errors;
pub mod memory;
mod record_set;
mod row;

pub use cursor::{Border, KeyRange, Order};
pub use errors::{StorageError, StorageResult};
pub use record_set::RecordSet;
pub use row::{ResultRow, RowAccess, TableRow};

use serde::{Deserialize, Serialize};

use crate::expr::Operator;
use crate::value::{RecordId, Value, ValueType};

/// Pseudo column holding the record id.
pub const ID_COLUMN: &str = "_id";
/// Pseudo column holding the record key of keyed tables.
pub const KEY_COLUMN: &str = "_key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub value_type: ValueType,
    /// Target table of a reference column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            reference: None,
        }
    }

    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: ValueType::Ref,
            reference: Some(target.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Ordered lexicon of whole values
    Range,
    /// Tokenized text lexicon
    FullText,
}

pub trait Database {
    /// Names starting with `prefix`, in lexical order.
    fn table_names(&self, prefix: &str, order: Order) -> Vec<String>;

    fn table(&self, name: &str) -> Option<&dyn Table>;
}

pub trait Table {
    fn name(&self) -> &str;

    fn size(&self) -> usize;

    fn columns(&self) -> &[ColumnInfo];

    fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// All record ids in ascending order.
    fn record_ids(&self) -> Box<dyn Iterator<Item = RecordId> + '_>;

    fn contains(&self, id: RecordId) -> bool;

    /// Value of `column` for record `id`; `None` for unknown columns or records.
    fn value(&self, id: RecordId, column: &str) -> Option<Value>;

    /// An index on `column` able to answer `op`.
    fn index(&self, column: &str, op: Operator) -> Option<&dyn Index>;

    fn is_keyed(&self) -> bool {
        false
    }

    /// Record ids whose key falls in `range`, in key order. `None` for
    /// tables without keys.
    fn key_cursor<'a>(&'a self, _range: &KeyRange) -> Option<Box<dyn Iterator<Item = RecordId> + 'a>> {
        None
    }
}

pub trait Index {
    fn name(&self) -> &str;

    fn column(&self) -> &str;

    fn kind(&self) -> IndexKind;

    fn supports(&self, op: Operator) -> bool;

    /// Number of distinct terms.
    fn lexicon_size(&self) -> usize;

    /// Posting count of one term, `None` when the term is absent.
    fn term_size(&self, term: &Value) -> Option<usize>;

    /// The index's own estimate for a text query.
    fn estimate_query(&self, op: Operator, query: &str) -> usize;

    /// Terms inside `range`, at most `limit` of them.
    fn lexicon_cursor(&self, range: &KeyRange, limit: Option<usize>) -> Vec<Value>;

    /// Total postings of `terms`.
    fn estimate_terms(&self, terms: &[Value]) -> usize {
        terms.iter().filter_map(|t| self.term_size(t)).sum()
    }

    fn lookup(&self, term: &Value) -> Vec<RecordId>;

    /// Record ids whose key falls in `range`, in key order.
    fn cursor<'a>(&'a self, range: &KeyRange) -> Box<dyn Iterator<Item = RecordId> + 'a>;

    /// Answers a text query; `None` when the operator is not served.
    fn search(&self, op: Operator, query: &Value) -> Option<Vec<RecordId>>;
}

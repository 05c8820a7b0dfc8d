//! Physical shard discovery
//!
//! A logical table `Logs` is backed by tables named `Logs_YYYYMM` (month
//! shards) and `Logs_YYYYMMDD` (day shards). Tables with any other suffix
//! are ignored.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::errors::{ShardingError, ShardingResult};
use super::range::ShardRange;
use crate::storage::{Database, Order, Table};

/// One physical table of a logical table.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    pub table_name: String,
    /// Date suffix of the table name
    pub key: String,
    pub range: ShardRange,
}

impl Shard {
    pub fn table<'a>(&self, db: &'a dyn Database) -> ShardingResult<&'a dyn Table> {
        db.table(&self.table_name)
            .ok_or_else(|| ShardingError::NoSuchShard(self.table_name.clone()))
    }
}

fn shard_key_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})?$").ok())
        .as_ref()
}

/// Parses a `YYYYMM` or `YYYYMMDD` suffix.
pub fn parse_shard_key(key: &str) -> Option<ShardRange> {
    let captures = shard_key_pattern()?.captures(key)?;
    let year = captures.get(1)?.as_str().parse().ok()?;
    let month = captures.get(2)?.as_str().parse().ok()?;
    let day = match captures.get(3) {
        Some(day) => Some(day.as_str().parse().ok()?),
        None => None,
    };
    ShardRange::new(year, month, day)
}

/// `(previous, current, next)` for every shard of `shards`.
pub fn windows(shards: &[Shard]) -> impl Iterator<Item = (Option<&Shard>, &Shard, Option<&Shard>)> {
    shards.iter().enumerate().map(move |(i, current)| {
        let previous = i.checked_sub(1).and_then(|p| shards.get(p));
        (previous, current, shards.get(i + 1))
    })
}

pub struct ShardEnumerator<'a> {
    db: &'a dyn Database,
    logical_table: String,
}

impl<'a> ShardEnumerator<'a> {
    pub fn new(db: &'a dyn Database, logical_table: &str) -> ShardingResult<Self> {
        if logical_table.is_empty() {
            return Err(ShardingError::invalid_argument("logical_table is missing"));
        }
        Ok(Self {
            db,
            logical_table: logical_table.to_string(),
        })
    }

    pub fn logical_table(&self) -> &str {
        &self.logical_table
    }

    /// Shards in `order`, month shards narrowed by the day shard that
    /// follows them.
    ///
    /// Fails with `NoSuchShard` when the logical table has no shard.
    pub fn enumerate(&self, order: Order) -> ShardingResult<Vec<Shard>> {
        let prefix = format!("{}_", self.logical_table);
        let parsed: Vec<Shard> = self
            .db
            .table_names(&prefix, Order::Ascending)
            .into_iter()
            .filter_map(|table_name| {
                let key = table_name.strip_prefix(&prefix)?.to_string();
                let range = parse_shard_key(&key)?;
                Some(Shard {
                    table_name,
                    key,
                    range,
                })
            })
            .collect();
        if parsed.is_empty() {
            return Err(ShardingError::NoSuchShard(self.logical_table.clone()));
        }

        let mut shards: Vec<Shard> = windows(&parsed)
            .map(|(_, current, next)| {
                let mut shard = current.clone();
                if let Some(max_day) = next.and_then(|next| narrowing_day(&current.range, &next.range)) {
                    shard.range = shard.range.with_max_day(max_day);
                }
                shard
            })
            .collect();
        if order == Order::Descending {
            shards.reverse();
        }
        debug!(
            logical_table = %self.logical_table,
            n_shards = shards.len(),
            order = order.as_str(),
            "SHARDS_ENUMERATED"
        );
        Ok(shards)
    }
}

/// Day a month shard ends at when the next shard is a day shard of the
/// same month.
fn narrowing_day(current: &ShardRange, next: &ShardRange) -> Option<u32> {
    if current.is_day() || next.year != current.year || next.month != current.month {
        return None;
    }
    next.day.filter(|day| *day > 1)
}

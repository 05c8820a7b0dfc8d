//! Per-query execution state

use serde::Serialize;

use crate::config::Config;

/// Mutable state of one logical query.
///
/// `current_offset` is debt still owed by the shards not visited yet;
/// `current_limit` is what they may still contribute. A negative limit
/// means "everything", trimmed once all shards are done.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub config: Config,
    pub current_offset: usize,
    pub current_limit: i64,
    /// Per-query override of the range-index strategy
    pub use_range_index: Option<bool>,
    /// Shards whose records were read, in visiting order
    pub visited_shards: Vec<String>,
}

impl ExecutionContext {
    pub fn new(config: Config, offset: usize, limit: i64) -> Self {
        Self {
            config,
            current_offset: offset,
            current_limit: limit,
            use_range_index: None,
            visited_shards: Vec::new(),
        }
    }

    pub fn with_range_index_override(mut self, use_range_index: Option<bool>) -> Self {
        self.use_range_index = use_range_index;
        self
    }

    /// True once a non-negative limit has been used up.
    pub fn is_satisfied(&self) -> bool {
        self.current_limit == 0
    }

    /// Remaining records a shard may contribute, `None` when unbounded.
    pub fn remaining(&self) -> Option<usize> {
        usize::try_from(self.current_limit).ok()
    }

    /// Accounts for `taken` records contributed by a shard.
    pub fn consume(&mut self, taken: usize) {
        if self.current_limit > 0 {
            let taken = i64::try_from(taken).unwrap_or(i64::MAX);
            self.current_limit = (self.current_limit - taken).max(0);
        }
    }
}

/// Start and length of the page `offset`/`limit` select out of `size`
/// records.
///
/// A negative offset counts from the end. A negative limit keeps
/// `size + limit + 1` records, so `-1` means all of them.
pub fn normalize(size: usize, offset: i64, limit: i64) -> (usize, usize) {
    let size_i = i64::try_from(size).unwrap_or(i64::MAX);
    let start = if offset < 0 {
        (size_i + offset).max(0)
    } else {
        offset.min(size_i)
    };
    let limit = if limit < 0 {
        (size_i + limit + 1).max(0)
    } else {
        limit
    };
    let count = limit.min(size_i - start);
    (start as usize, count.max(0) as usize)
}

/// Page bounds as reported back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Paging {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
        }
    }
}

impl Paging {
    /// Applies the page to `items`.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let (start, count) = normalize(items.len(), self.offset, self.limit);
        items.into_iter().skip(start).take(count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_positive() {
        assert_eq!(normalize(10, 0, 3), (0, 3));
        assert_eq!(normalize(10, 8, 3), (8, 2));
        assert_eq!(normalize(10, 12, 3), (10, 0));
    }

    #[test]
    fn test_normalize_negative_limit() {
        assert_eq!(normalize(10, 0, -1), (0, 10));
        assert_eq!(normalize(10, 0, -3), (0, 8));
        assert_eq!(normalize(10, 4, -1), (4, 6));
        assert_eq!(normalize(2, 0, -5), (0, 0));
    }

    #[test]
    fn test_normalize_negative_offset() {
        assert_eq!(normalize(10, -2, 5), (8, 2));
        assert_eq!(normalize(10, -20, 5), (0, 5));
    }

    #[test]
    fn test_context_consumes_limit() {
        let mut ctx = ExecutionContext::new(Config::default(), 0, 3);
        assert_eq!(ctx.remaining(), Some(3));
        ctx.consume(2);
        assert!(!ctx.is_satisfied());
        ctx.consume(5);
        assert!(ctx.is_satisfied());

        let mut unbounded = ExecutionContext::new(Config::default(), 0, -1);
        assert_eq!(unbounded.remaining(), None);
        unbounded.consume(100);
        assert_eq!(unbounded.current_limit, -1);
    }

    #[test]
    fn test_paging_apply() {
        let paging = Paging { offset: 1, limit: 2 };
        assert_eq!(paging.apply(vec![1, 2, 3, 4]), vec![2, 3]);
    }
}

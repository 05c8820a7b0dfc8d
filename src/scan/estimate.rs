//! Cardinality estimation
//!
//! Estimates are upper-bound oriented: a condition no index can answer is
//! assumed to hit every record, and every estimate is capped at the table
//! size.

use tracing::trace;

use super::builder::{BuildOptions, ScanInfoBuilder};
use super::info::ScanInfo;
use super::resolve::resolve_index;
use crate::expr::{Expression, Operator};
use crate::storage::{Database, Table, KEY_COLUMN};
use crate::value::Value;

const SAMPLING_RATIO: f64 = 0.01;
const MIN_SAMPLES: usize = 10;
const MAX_SAMPLES: usize = 1000;

/// Number of lexicon terms sampled for range and prefix estimates.
pub fn sampling_limit(lexicon_size: usize) -> usize {
    ((lexicon_size as f64 * SAMPLING_RATIO) as usize).clamp(MIN_SAMPLES, MAX_SAMPLES)
}

/// The literal a regular expression matches, if it is a plain literal.
///
/// Patterns with anchors, quantifiers, classes, groups or escapes cannot be
/// pre-filtered through a term index.
pub fn regexp_literal(pattern: &str) -> Option<&str> {
    const META: &[char] = &[
        '\\', '^', '$', '.', '*', '+', '?', '{', '}', '(', ')', '[', ']', '|',
    ];
    if pattern.is_empty() || pattern.contains(META) {
        None
    } else {
        Some(pattern)
    }
}

pub struct CardinalityEstimator<'a> {
    db: &'a dyn Database,
    table: &'a dyn Table,
}

impl<'a> CardinalityEstimator<'a> {
    pub fn new(db: &'a dyn Database, table: &'a dyn Table) -> Self {
        Self { db, table }
    }

    /// Estimated hit count of one condition.
    pub fn estimate(&self, si: &ScanInfo) -> usize {
        let size = self.table.size();
        if si.is_pop() || si.is_all_records() || si.flags.computed {
            return size;
        }
        let estimated = match si.op {
            Operator::Call if si.between.is_some() => self.estimate_range(si),
            Operator::Call => None,
            _ => self.estimate_condition(si),
        };
        estimated.unwrap_or(size).min(size)
    }

    fn estimate_condition(&self, si: &ScanInfo) -> Option<usize> {
        let op = si.effective_op();
        match op {
            Operator::Equal => {
                let path = si.column_path()?;
                let resolved = resolve_index(self.db, self.table, &path, op)?;
                let term = cast_query(si, resolved.key_type())?;
                Some(resolved.index.term_size(&term).unwrap_or(0))
            }
            Operator::Match | Operator::Near | Operator::Similar => {
                let path = si.column_path()?;
                let resolved = resolve_index(self.db, self.table, &path, op)?;
                let query = si.query.as_ref()?.as_text()?;
                Some(resolved.index.estimate_query(op, query))
            }
            Operator::Regexp => {
                let path = si.column_path()?;
                let resolved = resolve_index(self.db, self.table, &path, op)?;
                let literal = regexp_literal(si.query.as_ref()?.as_text()?)?;
                Some(resolved.index.estimate_query(Operator::Match, literal))
            }
            Operator::Less
            | Operator::LessEqual
            | Operator::Greater
            | Operator::GreaterEqual
            | Operator::Prefix => self.estimate_range(si),
            _ => None,
        }
    }

    /// Samples the lexicon inside the condition's key range.
    fn estimate_range(&self, si: &ScanInfo) -> Option<usize> {
        let path = si.column_path()?;
        let op = if si.between.is_some() {
            Operator::Call
        } else {
            si.effective_op()
        };

        let resolved = match resolve_index(self.db, self.table, &path, op) {
            Some(resolved) => resolved,
            None => return self.estimate_key_range(si, &path),
        };
        let range = si.key_range(resolved.key_type())?;
        let limit = sampling_limit(resolved.index.lexicon_size());
        let mut terms = resolved.index.lexicon_cursor(&range, Some(limit + 1));
        let truncated = terms.len() > limit;
        terms.truncate(limit);

        let sampled = resolved.index.estimate_terms(&terms);
        let estimated = if truncated && !terms.is_empty() {
            // Assume the unsampled terms are as dense as the sampled ones
            sampled.saturating_mul(resolved.index.lexicon_size()) / terms.len()
        } else {
            sampled
        };
        trace!(
            index = resolved.index.name(),
            sampled_terms = terms.len(),
            truncated,
            estimated,
            "RANGE_ESTIMATED"
        );
        Some(estimated)
    }

    /// Range over the key of a keyed table without an index.
    fn estimate_key_range(&self, si: &ScanInfo, path: &[String]) -> Option<usize> {
        if path.len() != 1 || path[0] != KEY_COLUMN || !self.table.is_keyed() {
            return None;
        }
        let key_type = self
            .table
            .record_ids()
            .next()
            .and_then(|id| self.table.value(id, KEY_COLUMN))
            .and_then(|key| key.value_type());
        let range = si.key_range(key_type)?;
        let limit = sampling_limit(self.table.size());
        let mut cursor = self.table.key_cursor(&range)?;
        let sampled = cursor.by_ref().take(limit).count();
        let more = usize::from(cursor.next().is_some());
        Some(sampled + more)
    }

    /// Estimated hit count of a whole filter.
    ///
    /// Conditions are folded along the group structure: AND and AND_NOT
    /// keep the smaller side, OR adds up, ADJUST keeps the left side.
    pub fn estimate_expression(&self, expr: &Expression) -> usize {
        let size = self.table.size();
        let sis = match ScanInfoBuilder::new(self.db, self.table)
            .with_options(BuildOptions {
                merge_ranges: true,
                reorder: false,
            })
            .build(expr, Operator::Or, true)
        {
            Ok(sis) => sis,
            Err(_) => return size,
        };

        let fold = |left: Option<usize>, right: usize, op: Operator| -> usize {
            match (left, op) {
                (None, _) => right,
                (Some(l), Operator::And) => l.min(right),
                (Some(l), Operator::AndNot) => l,
                (Some(l), Operator::Or) => l.saturating_add(right).min(size),
                (Some(l), _) => l,
            }
        };

        let mut stack: Vec<Option<usize>> = Vec::new();
        let mut current: Option<usize> = None;
        for si in &sis {
            if si.is_pop() {
                let outer = stack.pop().flatten();
                let inner = current.unwrap_or(0);
                current = Some(fold(outer, inner, si.logical_op));
                continue;
            }
            if si.flags.push {
                stack.push(current.take());
            }
            current = Some(fold(current, self.estimate(si), si.logical_op));
        }
        current.unwrap_or(size).min(size)
    }
}

fn cast_query(si: &ScanInfo, key_type: Option<crate::value::ValueType>) -> Option<Value> {
    let query = si.query.as_ref()?;
    match key_type {
        Some(ty) => query.cast_to(ty),
        None => Some(query.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryDatabase;
    use crate::storage::{ColumnInfo, IndexKind};
    use crate::value::ValueType;

    fn fixture() -> MemoryDatabase {
        let mut db = MemoryDatabase::new();
        let table = db
            .create_table(
                "Events",
                vec![
                    ColumnInfo::new("n", ValueType::Int),
                    ColumnInfo::new("tag", ValueType::Text),
                    ColumnInfo::new("body", ValueType::Text),
                    ColumnInfo::new("plain", ValueType::Int),
                ],
            )
            .unwrap();
        for i in 0..100 {
            let tag = if i % 10 == 0 { "rare" } else { "common" };
            let body = if i % 2 == 0 { "red fox" } else { "blue hen" };
            table
                .insert(vec![
                    ("n", Value::Int(i)),
                    ("tag", Value::text(tag)),
                    ("body", Value::text(body)),
                    ("plain", Value::Int(i)),
                ])
                .unwrap();
        }
        table.create_index("n", IndexKind::Range).unwrap();
        table.create_index("tag", IndexKind::Range).unwrap();
        table.create_index("body", IndexKind::FullText).unwrap();
        db
    }

    fn estimate(db: &MemoryDatabase, expr: Expression) -> usize {
        let table = db.table("Events").unwrap();
        let sis = ScanInfoBuilder::new(db, table)
            .with_options(BuildOptions {
                merge_ranges: true,
                reorder: false,
            })
            .build(&expr, Operator::Or, true)
            .unwrap();
        assert_eq!(sis.len(), 1);
        CardinalityEstimator::new(db, table).estimate(&sis[0])
    }

    fn condition(column: &str, op: Operator, value: impl Into<Value>) -> Expression {
        Expression::new().column(column).constant(value).operator(op)
    }

    #[test]
    fn test_sampling_limit_clamps() {
        assert_eq!(sampling_limit(0), 10);
        assert_eq!(sampling_limit(5_000), 50);
        assert_eq!(sampling_limit(10_000_000), 1000);
    }

    #[test]
    fn test_regexp_literal() {
        assert_eq!(regexp_literal("fox"), Some("fox"));
        assert_eq!(regexp_literal("^fox"), None);
        assert_eq!(regexp_literal("fo+x"), None);
        assert_eq!(regexp_literal("(a)\\1"), None);
    }

    #[test]
    fn test_equality_uses_term_size() {
        let db = fixture();
        assert_eq!(estimate(&db, condition("tag", Operator::Equal, "rare")), 10);
        assert_eq!(estimate(&db, condition("tag", Operator::Equal, "absent")), 0);
    }

    #[test]
    fn test_match_delegates_to_index() {
        let db = fixture();
        assert_eq!(estimate(&db, condition("body", Operator::Match, "fox")), 50);
        assert_eq!(estimate(&db, condition("body", Operator::Regexp, "fox")), 50);
        assert_eq!(estimate(&db, condition("body", Operator::Regexp, "f.x")), 100);
    }

    #[test]
    fn test_range_sampling_is_exact_below_limit() {
        let db = fixture();
        assert_eq!(estimate(&db, condition("n", Operator::Less, 5)), 5);
        assert_eq!(estimate(&db, condition("n", Operator::GreaterEqual, 95)), 5);
    }

    #[test]
    fn test_truncated_range_sample_extrapolates_conservatively() {
        let db = fixture();
        // 50 terms in range, sample of 10: extrapolated over the lexicon
        let estimated = estimate(&db, condition("n", Operator::GreaterEqual, 50));
        assert!(estimated >= 50);
        assert!(estimated <= 100);
    }

    #[test]
    fn test_unindexed_condition_estimates_table_size() {
        let db = fixture();
        assert_eq!(estimate(&db, condition("plain", Operator::Equal, 3)), 100);
        assert_eq!(estimate(&db, condition("n", Operator::NotEqual, 3)), 100);
    }

    #[test]
    fn test_between_call_recurses_to_range() {
        let db = fixture();
        let expr = Expression::new()
            .procedure("between")
            .column("n")
            .constant(10)
            .constant("include")
            .constant(14)
            .constant("include")
            .call(5);
        assert_eq!(estimate(&db, expr), 5);
        let other = Expression::new().procedure("all_records").call(0);
        assert_eq!(estimate(&db, other), 100);
    }

    #[test]
    fn test_key_range_without_index_probes_cursor() {
        let mut db = MemoryDatabase::new();
        let table = db.create_keyed_table("Terms", vec![]).unwrap();
        for i in 0..30 {
            table.insert_with_key(Value::Int(i), vec![]).unwrap();
        }

        let table = db.table("Terms").unwrap();
        let expr = condition("_key", Operator::GreaterEqual, 0);
        let sis = ScanInfoBuilder::new(&db, table)
            .build(&expr, Operator::Or, true)
            .unwrap();
        let estimator = CardinalityEstimator::new(&db, table);
        assert_eq!(estimator.estimate(&sis[0]), 11);

        let narrow = condition("_key", Operator::Less, 3);
        let sis = ScanInfoBuilder::new(&db, table)
            .build(&narrow, Operator::Or, true)
            .unwrap();
        assert_eq!(estimator.estimate(&sis[0]), 3);
    }

    #[test]
    fn test_expression_estimate_folds_groups() {
        let db = fixture();
        let table = db.table("Events").unwrap();
        let estimator = CardinalityEstimator::new(&db, table);

        let and = condition("tag", Operator::Equal, "rare")
            .and_then(&condition("body", Operator::Match, "fox"), Operator::And);
        assert_eq!(estimator.estimate_expression(&and), 10);

        let or = condition("tag", Operator::Equal, "rare")
            .and_then(&condition("body", Operator::Match, "fox"), Operator::Or);
        assert_eq!(estimator.estimate_expression(&or), 60);

        let unbuildable = Expression::new()
            .column("n")
            .column("plain")
            .operator(Operator::Less);
        assert_eq!(estimator.estimate_expression(&unbuildable), 100);
    }
}

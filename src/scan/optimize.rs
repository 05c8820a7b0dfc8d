//! Condition-list rewrites
//!
//! Both passes only touch conditions whose regrouping cannot change the
//! result: the head of a run must start a fresh group, be the first
//! condition of a fresh result, or itself be AND-joined.

use super::info::{BetweenRange, ScanInfo};
use crate::expr::Operator;
use crate::storage::Border;

fn starts_run(sis: &[ScanInfo], i: usize, fresh: bool) -> bool {
    let si = &sis[i];
    !si.is_pop()
        && (si.flags.push
            || si.logical_op == Operator::And
            || (i == 0 && fresh && si.logical_op == Operator::Or))
}

fn continues_run(si: &ScanInfo) -> bool {
    !si.is_pop() && !si.flags.push && si.logical_op == Operator::And
}

fn bound_condition(si: &ScanInfo) -> bool {
    !si.is_pop() && !si.flags.computed && si.op != Operator::Call && si.query.is_some()
}

/// Folds `column > a AND column < b` pairs into one between condition.
pub fn merge_ranges(sis: &mut Vec<ScanInfo>, fresh: bool) {
    let mut i = 0;
    while i + 1 < sis.len() {
        if let Some(range) = mergeable(sis, i, fresh) {
            let upper = sis.remove(i + 1);
            let merged = ScanInfo::between_of(&sis[i], &upper, range);
            sis[i] = merged;
        }
        i += 1;
    }
}

fn mergeable(sis: &[ScanInfo], i: usize, fresh: bool) -> Option<BetweenRange> {
    let (lower, upper) = (&sis[i], &sis[i + 1]);
    let lower_op = lower.effective_op();
    let upper_op = upper.effective_op();
    let same_target = lower.column_path().is_some()
        && lower.column_path() == upper.column_path()
        && same_indexes(lower, upper);
    if !(bound_condition(lower)
        && bound_condition(upper)
        && lower_op.is_lower_bound()
        && upper_op.is_upper_bound()
        && continues_run(upper)
        && starts_run(sis, i, fresh)
        && same_target)
    {
        return None;
    }
    Some(BetweenRange {
        min: lower.query.clone()?,
        min_border: if lower_op == Operator::GreaterEqual {
            Border::Include
        } else {
            Border::Exclude
        },
        max: upper.query.clone()?,
        max_border: if upper_op == Operator::LessEqual {
            Border::Include
        } else {
            Border::Exclude
        },
    })
}

fn same_indexes(a: &ScanInfo, b: &ScanInfo) -> bool {
    a.indexes.len() == b.indexes.len()
        && a
            .indexes
            .iter()
            .zip(&b.indexes)
            .all(|(x, y)| x.index == y.index && x.path == y.path && x.section == y.section)
}

/// Orders each AND-run by ascending estimate.
///
/// The first condition of the reordered run inherits the run head's
/// combinator and group flag.
pub fn reorder_by_estimate(
    sis: &mut Vec<ScanInfo>,
    fresh: bool,
    estimate: impl Fn(&ScanInfo) -> usize,
) {
    let mut i = 0;
    while i < sis.len() {
        if !starts_run(sis, i, fresh) {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < sis.len() && continues_run(&sis[end]) {
            end += 1;
        }
        if end - i > 1 {
            let head_push = sis[i].flags.push;
            let head_op = sis[i].logical_op;
            let mut run: Vec<(usize, ScanInfo)> =
                sis.drain(i..end).map(|si| (estimate(&si), si)).collect();
            run.sort_by_key(|(estimated, _)| *estimated);
            let reordered = run.into_iter().enumerate().map(|(k, (_, mut si))| {
                if k == 0 {
                    si.flags.push = head_push;
                    si.logical_op = head_op;
                } else {
                    si.flags.push = false;
                    si.logical_op = Operator::And;
                }
                si
            });
            sis.splice(i..i, reordered);
        }
        i = end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Operand;
    use crate::value::Value;

    fn cond(column: &str, op: Operator, value: i64, logical_op: Operator) -> ScanInfo {
        let mut si = ScanInfo::new(0);
        si.op = op;
        si.args = vec![
            Operand::Column(column.to_string()),
            Operand::Constant(Value::Int(value)),
        ];
        si.query = Some(Value::Int(value));
        si.logical_op = logical_op;
        si.flags.push = false;
        si
    }

    #[test]
    fn test_merge_adjacent_bounds() {
        let mut sis = vec![
            cond("x", Operator::GreaterEqual, 5, Operator::Or),
            cond("x", Operator::Less, 10, Operator::And),
        ];
        merge_ranges(&mut sis, true);
        assert_eq!(sis.len(), 1);
        let between = sis[0].between.clone().unwrap();
        assert_eq!(between.min, Value::Int(5));
        assert_eq!(between.min_border, Border::Include);
        assert_eq!(between.max_border, Border::Exclude);
        assert_eq!(sis[0].logical_op, Operator::Or);
        assert_eq!(sis[0].procedure(), Some("between"));
    }

    #[test]
    fn test_no_merge_across_columns_or_order() {
        let mut sis = vec![
            cond("x", Operator::GreaterEqual, 5, Operator::Or),
            cond("y", Operator::Less, 10, Operator::And),
        ];
        merge_ranges(&mut sis, true);
        assert_eq!(sis.len(), 2);

        let mut sis = vec![
            cond("x", Operator::Less, 10, Operator::Or),
            cond("x", Operator::GreaterEqual, 5, Operator::And),
        ];
        merge_ranges(&mut sis, true);
        assert_eq!(sis.len(), 2);
    }

    #[test]
    fn test_no_merge_when_head_is_or_joined() {
        // (c OR x >= 5) AND x < 10
        let mut sis = vec![
            cond("c", Operator::Equal, 1, Operator::Or),
            cond("x", Operator::GreaterEqual, 5, Operator::Or),
            cond("x", Operator::Less, 10, Operator::And),
        ];
        merge_ranges(&mut sis, true);
        assert_eq!(sis.len(), 3);
    }

    #[test]
    fn test_no_merge_into_non_fresh_or() {
        let mut sis = vec![
            cond("x", Operator::GreaterEqual, 5, Operator::Or),
            cond("x", Operator::Less, 10, Operator::And),
        ];
        merge_ranges(&mut sis, false);
        assert_eq!(sis.len(), 2);
    }

    #[test]
    fn test_reorder_keeps_head_combinator() {
        let mut sis = vec![
            cond("a", Operator::Equal, 100, Operator::Or),
            cond("b", Operator::Equal, 3, Operator::And),
            cond("c", Operator::Equal, 50, Operator::And),
        ];
        reorder_by_estimate(&mut sis, true, |si| {
            si.query.as_ref().and_then(Value::as_int).unwrap_or(0) as usize
        });
        let order: Vec<i64> = sis
            .iter()
            .map(|si| si.query.as_ref().and_then(Value::as_int).unwrap())
            .collect();
        assert_eq!(order, vec![3, 50, 100]);
        assert_eq!(sis[0].logical_op, Operator::Or);
        assert_eq!(sis[1].logical_op, Operator::And);
        assert_eq!(sis[2].logical_op, Operator::And);
    }

    #[test]
    fn test_reorder_leaves_or_joined_head_in_place() {
        let mut sis = vec![
            cond("z", Operator::Equal, 1, Operator::Or),
            cond("a", Operator::Equal, 100, Operator::Or),
            cond("b", Operator::Equal, 3, Operator::And),
        ];
        reorder_by_estimate(&mut sis, false, |si| {
            si.query.as_ref().and_then(Value::as_int).unwrap_or(0) as usize
        });
        let order: Vec<i64> = sis
            .iter()
            .map(|si| si.query.as_ref().and_then(Value::as_int).unwrap())
            .collect();
        assert_eq!(order, vec![1, 100, 3]);
    }
}

//! Scan-condition builder
//!
//! Splits a filter tape into a flat list of scan conditions, each answerable
//! by one index lookup or by evaluating its own instruction span. Nesting
//! is preserved with PUSH/POP flags instead of a tree:
//!
//! - a PUSH condition stacks the running result and starts a fresh one
//! - a POP marker combines the running result into the stacked one
//!
//! Logical operators are folded in as they arrive (see [`put_logical_op`]),
//! relabelling, rotating or closing groups so that executing the list left
//! to right gives the same records as evaluating the tree.

use tracing::trace;

use super::estimate::CardinalityEstimator;
use super::info::{IndexRef, ScanInfo};
use super::optimize;
use super::resolve::resolve_index;
use crate::config::Config;
use crate::expr::{CodeGenerator, ExprError, ExprResult, Expression, Node, Operator};
use crate::storage::{Database, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Fold `lower AND upper` on one column into a between condition
    pub merge_ranges: bool,
    /// Order AND-runs by estimated hit count
    pub reorder: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            merge_ranges: true,
            reorder: true,
        }
    }
}

impl From<&Config> for BuildOptions {
    fn from(config: &Config) -> Self {
        Self {
            merge_ranges: config.merge_range_conditions,
            reorder: config.reorder_by_selectivity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Column1,
    Column2,
    Constant,
}

pub struct ScanInfoBuilder<'a> {
    db: &'a dyn Database,
    table: &'a dyn Table,
    options: BuildOptions,
}

impl<'a> ScanInfoBuilder<'a> {
    pub fn new(db: &'a dyn Database, table: &'a dyn Table) -> Self {
        Self {
            db,
            table,
            options: BuildOptions::default(),
        }
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds conditions for a tree by generating its tape first.
    pub fn build_node(&self, node: &Node, op: Operator, fresh: bool) -> ExprResult<Vec<ScanInfo>> {
        self.build(&CodeGenerator::generate(node), op, fresh)
    }

    /// Builds the condition list for `expr`.
    ///
    /// `op` is how the whole filter combines with the caller's result set,
    /// `fresh` tells whether that result set starts out empty.
    pub fn build(&self, expr: &Expression, op: Operator, fresh: bool) -> ExprResult<Vec<ScanInfo>> {
        let codes = expr.codes();
        let last = match codes.len() {
            0 => return Err(ExprError::invalid("empty expression")),
            n => n - 1,
        };

        let mut sis: Vec<ScanInfo> = Vec::new();
        let mut current: Option<ScanInfo> = None;
        let mut state = State::Start;
        let mut n_conditions = 0usize;
        let mut n_logicals = 0usize;

        for (position, code) in codes.iter().enumerate() {
            match code.op {
                relational if relational.is_relational() => {
                    if state == State::Start {
                        return Err(ExprError::invalid(format!(
                            "{} without operands at {}",
                            relational.as_str(),
                            position
                        )));
                    }
                    let mut si = current
                        .take()
                        .ok_or_else(|| ExprError::invalid("condition without operands"))?;
                    si.op = relational;
                    si.end = position;
                    si.weight = code.weight;
                    self.finish_condition(&mut si)?;
                    sis.push(si);
                    state = State::Start;
                    n_conditions += 1;
                }
                Operator::Not => {
                    let follows_condition = state == State::Start
                        && current.is_none()
                        && sis
                            .last()
                            .is_some_and(|si| !si.is_pop() && si.end + 1 == position);
                    if !follows_condition {
                        return Err(ExprError::invalid(format!(
                            "not at {} does not negate a single condition",
                            position
                        )));
                    }
                    self.negate_last(&mut sis, position)?;
                }
                logical if logical.is_logical() => {
                    if state != State::Start {
                        return Err(ExprError::invalid(format!(
                            "{} inside a condition at {}",
                            logical.as_str(),
                            position
                        )));
                    }
                    n_logicals += 1;
                    if n_logicals >= n_conditions {
                        return Err(ExprError::invalid(format!(
                            "{} lacks an operand at {}",
                            logical.as_str(),
                            position
                        )));
                    }
                    put_logical_op(&mut sis, logical, position)?;
                }
                computed if computed.is_arithmetic() || computed == Operator::GetMember => {
                    let si = match (state, current.as_mut()) {
                        (State::Start, _) | (_, None) => {
                            return Err(ExprError::invalid(format!(
                                "{} without operands at {}",
                                computed.as_str(),
                                position
                            )))
                        }
                        (_, Some(si)) => si,
                    };
                    si.flags.computed = true;
                    state = State::Column2;
                }
                Operator::Push => {
                    let si = current.get_or_insert_with(|| ScanInfo::new(position));
                    if state == State::Start {
                        si.flags.pre_const = true;
                    }
                    if let Some(operand) = &code.operand {
                        si.args.push(operand.clone());
                    }
                    state = State::Constant;
                }
                Operator::GetValue | Operator::GetRef => {
                    if state == State::Column1 {
                        return Err(ExprError::invalid("can't use column as a value"));
                    }
                    let si = current.get_or_insert_with(|| ScanInfo::new(position));
                    if let Some(operand) = &code.operand {
                        si.flags.accessor |= matches!(operand, crate::expr::Operand::Accessor(_));
                        si.args.push(operand.clone());
                    }
                    if state != State::Column2 {
                        state = State::Column1;
                    }
                }
                Operator::Call => {
                    let mut si = current
                        .take()
                        .unwrap_or_else(|| ScanInfo::new(position));
                    if code.relational || position == last {
                        si.op = Operator::Call;
                        si.end = position;
                        si.weight = code.weight;
                        self.finish_condition(&mut si)?;
                        sis.push(si);
                        state = State::Start;
                        n_conditions += 1;
                    } else {
                        si.flags.computed = true;
                        current = Some(si);
                        state = State::Column2;
                    }
                }
                other => {
                    return Err(ExprError::invalid(format!(
                        "unsupported op-code {} at {}",
                        other.as_str(),
                        position
                    )))
                }
            }
        }

        if state != State::Start || n_conditions != n_logicals + 1 {
            return Err(ExprError::invalid("unbalanced expression"));
        }

        if op == Operator::Or && fresh {
            let first = sis
                .first_mut()
                .ok_or_else(|| ExprError::invalid("no conditions"))?;
            if !first.flags.push || first.logical_op != Operator::Or {
                return Err(ExprError::invalid("unmatched nesting level"));
            }
            first.flags.push = false;
        } else {
            put_logical_op(&mut sis, op, codes.len())?;
        }

        if self.options.merge_ranges {
            optimize::merge_ranges(&mut sis, op == Operator::Or && fresh);
        }
        if self.options.reorder {
            let estimator = CardinalityEstimator::new(self.db, self.table);
            optimize::reorder_by_estimate(&mut sis, op == Operator::Or && fresh, |si| {
                estimator.estimate(si)
            });
        }
        trace!(n_conditions = sis.len(), "SCAN_INFO_BUILT");
        Ok(sis)
    }

    /// Fills derived operands and index references of a closed condition.
    fn finish_condition(&self, si: &mut ScanInfo) -> ExprResult<()> {
        si.derive_operands()?;
        self.attach_indexes(si);
        Ok(())
    }

    fn attach_indexes(&self, si: &mut ScanInfo) {
        si.indexes.clear();
        if si.flags.computed {
            return;
        }
        let op = match si.op {
            Operator::Call if si.between.is_some() => Operator::Call,
            Operator::Call => return,
            _ => si.effective_op(),
        };
        let path = match si.column_path() {
            Some(path) => path,
            None => return,
        };
        if let Some(resolved) = resolve_index(self.db, self.table, &path, op) {
            si.indexes.push(IndexRef {
                path,
                index: resolved.index.name().to_string(),
                section: 0,
                weight: si.weight,
            });
        }
    }

    /// Applies a NOT that directly follows the last condition.
    ///
    /// Comparisons flip to their complement. Anything else becomes
    /// "all records AND_NOT condition" in the condition's own group slot.
    fn negate_last(&self, sis: &mut Vec<ScanInfo>, position: usize) -> ExprResult<()> {
        let mut last = sis
            .pop()
            .ok_or_else(|| ExprError::invalid("not without condition"))?;
        match last.op.complement() {
            Some(complement) if last.between.is_none() => {
                last.op = complement;
                last.end = position;
                self.attach_indexes(&mut last);
                sis.push(last);
            }
            _ => {
                let mut all = ScanInfo::all_records(last.start);
                all.end = last.end;
                all.flags.push = last.flags.push;
                all.logical_op = last.logical_op;
                last.flags.push = false;
                last.logical_op = Operator::AndNot;
                sis.push(all);
                sis.push(last);
            }
        }
        Ok(())
    }
}

/// Folds a binary logical operator into the condition list.
///
/// Scans backwards for the two operand groups. When the right group is a
/// single-operator run it is relabelled into the left group; when only the
/// left group is homogeneous it is relabelled and rotated behind the right
/// group; otherwise a POP marker closes the right group.
pub(crate) fn put_logical_op(sis: &mut Vec<ScanInfo>, op: Operator, position: usize) -> ExprResult<()> {
    let end = sis.len();
    let mut nparens = 1usize;
    let mut ndifops = 0usize;
    let mut right_start = 0usize;
    let mut j = end;

    while j > 0 {
        j -= 1;
        if sis[j].flags.pop {
            ndifops += 1;
            nparens += 1;
            continue;
        }
        if sis[j].flags.push {
            nparens -= 1;
            if nparens > 0 {
                continue;
            }
            if right_start == 0 {
                if ndifops > 0 {
                    if j > 0 && op != Operator::AndNot {
                        nparens = 1;
                        ndifops = 0;
                        right_start = j;
                        continue;
                    }
                    sis.push(ScanInfo::pop_marker(op, position));
                } else {
                    sis[j].flags.push = false;
                    sis[j].logical_op = op;
                }
            } else if ndifops > 0 {
                sis.push(ScanInfo::pop_marker(op, position));
            } else {
                sis[j].flags.push = false;
                sis[j].logical_op = op;
                sis[j..end].rotate_left(right_start - j);
            }
            return Ok(());
        }
        if op == Operator::AndNot || op != sis[j].logical_op {
            ndifops += 1;
        }
    }
    Err(ExprError::invalid("unmatched nesting level"))
}

//! Tree evaluation against one row
//!
//! Comparisons involving null produce null, and `NOT null` stays null, so a
//! negated comparison and its complement agree on every row. Text
//! predicates on non-text operands are simply false.

use std::cmp::Ordering;

use regex::Regex;

use super::errors::{ExprError, ExprResult};
use super::node::Node;
use super::operator::Operator;
use crate::storage::{Border, RowAccess};
use crate::value::{compare, tokenize, Value};

pub const BETWEEN_PROCEDURE: &str = "between";
pub const ALL_RECORDS_PROCEDURE: &str = "all_records";

/// Default token distance for NEAR.
pub const DEFAULT_MAX_INTERVAL: i64 = 10;
/// Default shared-token threshold for SIMILAR.
pub const DEFAULT_SIMILARITY_THRESHOLD: i64 = 0;

pub struct Evaluator;

impl Evaluator {
    pub fn evaluate(node: &Node, row: &dyn RowAccess) -> ExprResult<Value> {
        match node {
            Node::Constant(value) => Ok(value.clone()),
            Node::Variable(name) => row
                .value(name)
                .ok_or_else(|| ExprError::UnknownColumn(name.clone())),
            Node::Accessor(path) => row
                .value_path(path)
                .ok_or_else(|| ExprError::UnknownColumn(path.join("."))),
            Node::Procedure { .. } => Ok(Value::Null),
            Node::Binary { op, left, right } => {
                let left = Self::evaluate(left, row)?;
                let right = Self::evaluate(right, row)?;
                Self::binary(*op, &left, &right)
            }
            Node::Logical { op, children } => Self::logical(*op, children, row),
            Node::Not(child) => match Self::evaluate(child, row)? {
                Value::Null => Ok(Value::Null),
                value => Ok(Value::Bool(!value.is_truthy())),
            },
            Node::Call { procedure, args } => Self::call(procedure, args, row),
        }
    }

    /// True when `node` holds for `row`.
    pub fn matches(node: &Node, row: &dyn RowAccess) -> ExprResult<bool> {
        Ok(Self::evaluate(node, row)?.is_truthy())
    }

    fn logical(op: Operator, children: &[Node], row: &dyn RowAccess) -> ExprResult<Value> {
        let (first, rest) = match children.split_first() {
            Some(split) => split,
            None => return Ok(Value::Bool(false)),
        };
        let result = match op {
            Operator::And => {
                for child in children {
                    if !Self::matches(child, row)? {
                        return Ok(Value::Bool(false));
                    }
                }
                true
            }
            Operator::Or => {
                for child in children {
                    if Self::matches(child, row)? {
                        return Ok(Value::Bool(true));
                    }
                }
                false
            }
            Operator::AndNot => {
                if !Self::matches(first, row)? {
                    return Ok(Value::Bool(false));
                }
                for child in rest {
                    if Self::matches(child, row)? {
                        return Ok(Value::Bool(false));
                    }
                }
                true
            }
            // Adjust only changes scores
            _ => Self::matches(first, row)?,
        };
        Ok(Value::Bool(result))
    }

    fn binary(op: Operator, left: &Value, right: &Value) -> ExprResult<Value> {
        let ordering = || compare(left, right);
        let value = match op {
            Operator::Equal => match ordering() {
                Some(o) => Value::Bool(o == Ordering::Equal),
                None if left.is_null() || right.is_null() => Value::Null,
                None => Value::Bool(false),
            },
            Operator::NotEqual => match ordering() {
                Some(o) => Value::Bool(o != Ordering::Equal),
                None if left.is_null() || right.is_null() => Value::Null,
                None => Value::Bool(true),
            },
            Operator::Less => relation(ordering(), |o| o == Ordering::Less),
            Operator::LessEqual => relation(ordering(), |o| o != Ordering::Greater),
            Operator::Greater => relation(ordering(), |o| o == Ordering::Greater),
            Operator::GreaterEqual => relation(ordering(), |o| o != Ordering::Less),
            op if op.is_text_search() => {
                let (text, query) = match (left.as_text(), right.as_text()) {
                    (Some(text), Some(query)) => (text, query),
                    _ => return Ok(Value::Bool(false)),
                };
                Value::Bool(text_predicate(op, text, query, None)?)
            }
            op if op.is_arithmetic() => arithmetic(op, left, right),
            _ => Value::Null,
        };
        Ok(value)
    }

    fn call(procedure: &Node, args: &[Node], row: &dyn RowAccess) -> ExprResult<Value> {
        let (name, selector_op) = match procedure {
            Node::Procedure { name, selector_op } => (name.as_str(), *selector_op),
            _ => return Err(ExprError::InvalidArgument("call target is not a procedure".into())),
        };
        let values = args
            .iter()
            .map(|arg| Self::evaluate(arg, row))
            .collect::<ExprResult<Vec<Value>>>()?;

        if let Some(op) = selector_op {
            let (text, query) = match (values.first(), values.get(1)) {
                (Some(Value::Text(text)), Some(Value::Text(query))) => (text, query),
                _ => return Ok(Value::Bool(false)),
            };
            let option = values.get(2).and_then(Value::as_int);
            return Ok(Value::Bool(text_predicate(op, text, query, option)?));
        }

        match name {
            BETWEEN_PROCEDURE => between(&values),
            ALL_RECORDS_PROCEDURE => Ok(Value::Bool(true)),
            other => Err(ExprError::UnknownProcedure(other.to_string())),
        }
    }
}

fn relation(ordering: Option<Ordering>, test: impl Fn(Ordering) -> bool) -> Value {
    match ordering {
        Some(o) => Value::Bool(test(o)),
        None => Value::Null,
    }
}

fn arithmetic(op: Operator, left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                Operator::Plus => a.checked_add(*b),
                Operator::Minus => a.checked_sub(*b),
                Operator::Star => a.checked_mul(*b),
                Operator::Slash => a.checked_div(*b),
                Operator::Mod => a.checked_rem(*b),
                _ => None,
            };
            result.map(Value::Int).unwrap_or(Value::Null)
        }
        (Value::Text(a), Value::Text(b)) if op == Operator::Plus => Value::Text(format!("{}{}", a, b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => match op {
                Operator::Plus => Value::Float(a + b),
                Operator::Minus => Value::Float(a - b),
                Operator::Star => Value::Float(a * b),
                Operator::Slash if b != 0.0 => Value::Float(a / b),
                Operator::Mod if b != 0.0 => Value::Float(a % b),
                _ => Value::Null,
            },
            _ => Value::Null,
        },
    }
}

/// `between(value, min, [min_border,] max [, max_border])`
fn between(values: &[Value]) -> ExprResult<Value> {
    let (value, min, min_border, max, max_border) = match values {
        [value, min, max] => (value, min, Border::Include, max, Border::Include),
        [value, min, min_border, max, max_border] => {
            (value, min, parse_border(min_border)?, max, parse_border(max_border)?)
        }
        _ => {
            return Err(ExprError::InvalidArgument(format!(
                "between takes 3 or 5 arguments, got {}",
                values.len()
            )))
        }
    };
    // False rather than null: `NOT between` must agree with the negated
    // conjunction of its two bounds
    let (lower, upper) = match (compare(value, min), compare(value, max)) {
        (Some(lower), Some(upper)) => (lower, upper),
        _ => return Ok(Value::Bool(false)),
    };
    let above = match min_border {
        Border::Include => lower != Ordering::Less,
        Border::Exclude => lower == Ordering::Greater,
    };
    let below = match max_border {
        Border::Include => upper != Ordering::Greater,
        Border::Exclude => upper == Ordering::Less,
    };
    Ok(Value::Bool(above && below))
}

pub(crate) fn parse_border(value: &Value) -> ExprResult<Border> {
    value
        .as_text()
        .ok_or_else(|| ExprError::InvalidArgument(format!("border must be text: {}", value)))?
        .parse()
        .map_err(ExprError::InvalidArgument)
}

fn text_predicate(op: Operator, text: &str, query: &str, option: Option<i64>) -> ExprResult<bool> {
    let result = match op {
        Operator::Prefix => text.starts_with(query),
        Operator::Suffix => text.ends_with(query),
        Operator::Regexp => Regex::new(query)
            .map_err(|e| ExprError::InvalidRegexp {
                pattern: query.to_string(),
                reason: e.to_string(),
            })?
            .is_match(text),
        Operator::Match => {
            let words = tokenize(text);
            let terms = tokenize(query);
            !terms.is_empty() && terms.iter().all(|t| words.contains(t))
        }
        Operator::Near => near(text, query, option.unwrap_or(DEFAULT_MAX_INTERVAL)),
        Operator::Similar => {
            let words = tokenize(text);
            let mut terms = tokenize(query);
            terms.sort();
            terms.dedup();
            let shared = terms.iter().filter(|t| words.contains(t)).count() as i64;
            shared >= option.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD).max(1)
        }
        _ => false,
    };
    Ok(result)
}

/// Every query token occurs within `max_interval` tokens of an occurrence of
/// the first query token.
fn near(text: &str, query: &str, max_interval: i64) -> bool {
    let words = tokenize(text);
    let terms = tokenize(query);
    let positions = |term: &String| -> Vec<i64> {
        words
            .iter()
            .enumerate()
            .filter(|(_, w)| *w == term)
            .map(|(i, _)| i as i64)
            .collect()
    };
    let (first, rest) = match terms.split_first() {
        Some(split) => split,
        None => return false,
    };
    let rest: Vec<Vec<i64>> = rest.iter().map(&positions).collect();
    positions(first).into_iter().any(|anchor| {
        rest.iter()
            .all(|ps| ps.iter().any(|p| (p - anchor).abs() <= max_interval))
    })
}

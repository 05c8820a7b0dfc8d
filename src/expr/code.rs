//! Filter instruction tape
//!
//! An [`Expression`] is the flat postfix program a filter compiles to.
//! Operands are loaded with `Push`/`GetValue`, operators consume them.
//! The tape is assembled once with the consuming builder methods below and
//! is read-only afterwards.

use serde::{Deserialize, Serialize};

use super::operator::Operator;
use crate::value::Value;

/// What a load instruction refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Constant(Value),
    Column(String),
    /// Dotted chain through reference columns (`author.name`)
    Accessor(Vec<String>),
    Procedure(String),
}

impl Operand {
    pub fn is_column(&self) -> bool {
        matches!(self, Operand::Column(_) | Operand::Accessor(_))
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match self {
            Operand::Constant(v) => Some(v),
            _ => None,
        }
    }

    /// Column path for column or accessor operands.
    pub fn column_path(&self) -> Option<Vec<String>> {
        match self {
            Operand::Column(name) => Some(vec![name.clone()]),
            Operand::Accessor(path) => Some(path.clone()),
            _ => None,
        }
    }
}

/// One instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Code {
    pub op: Operator,
    pub operand: Option<Operand>,
    pub nargs: usize,
    pub weight: i32,
    /// Marks a call whose result is a predicate
    pub relational: bool,
}

impl Code {
    pub fn new(op: Operator) -> Self {
        Self {
            op,
            operand: None,
            nargs: op.default_nargs(),
            weight: 1,
            relational: false,
        }
    }

    fn load(op: Operator, operand: Operand) -> Self {
        Self {
            operand: Some(operand),
            ..Self::new(op)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    codes: Vec<Code>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_codes(codes: Vec<Code>) -> Self {
        Self { codes }
    }

    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn constant(mut self, value: impl Into<Value>) -> Self {
        self.codes
            .push(Code::load(Operator::Push, Operand::Constant(value.into())));
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.codes
            .push(Code::load(Operator::GetValue, Operand::Column(name.into())));
        self
    }

    pub fn accessor<S: Into<String>>(mut self, path: impl IntoIterator<Item = S>) -> Self {
        let path = path.into_iter().map(Into::into).collect();
        self.codes
            .push(Code::load(Operator::GetValue, Operand::Accessor(path)));
        self
    }

    pub fn procedure(mut self, name: impl Into<String>) -> Self {
        self.codes
            .push(Code::load(Operator::Push, Operand::Procedure(name.into())));
        self
    }

    pub fn operator(mut self, op: Operator) -> Self {
        self.codes.push(Code::new(op));
        self
    }

    pub fn operator_n(mut self, op: Operator, nargs: usize) -> Self {
        self.codes.push(Code {
            nargs,
            ..Code::new(op)
        });
        self
    }

    /// Appends `op` with a relevance weight.
    pub fn weighted(mut self, op: Operator, weight: i32) -> Self {
        self.codes.push(Code {
            weight,
            ..Code::new(op)
        });
        self
    }

    /// Appends a predicate call taking `nargs` arguments.
    pub fn call(mut self, nargs: usize) -> Self {
        self.codes.push(Code {
            nargs,
            relational: true,
            ..Code::new(Operator::Call)
        });
        self
    }

    /// Appends a call used as a value inside a larger condition.
    pub fn value_call(mut self, nargs: usize) -> Self {
        self.codes.push(Code {
            nargs,
            ..Code::new(Operator::Call)
        });
        self
    }

    pub fn not(self) -> Self {
        self.operator(Operator::Not)
    }

    /// Appends `other` and combines both programs with `op`.
    ///
    /// An empty side is the identity: the other program is returned as is.
    pub fn and_then(mut self, other: &Expression, op: Operator) -> Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other.clone();
        }
        self.codes.extend(other.codes.iter().cloned());
        self.operator(op)
    }

    /// Copy of the instructions `start..=end`.
    pub fn slice(&self, start: usize, end: usize) -> Expression {
        let end = end.min(self.codes.len().saturating_sub(1));
        if start > end || self.codes.is_empty() {
            return Expression::new();
        }
        Expression {
            codes: self.codes[start..=end].to_vec(),
        }
    }
}

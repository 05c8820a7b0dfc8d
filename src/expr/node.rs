//! Expression tree

use serde::{Deserialize, Serialize};

use super::operator::Operator;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Constant(Value),
    /// Column of the record under evaluation
    Variable(String),
    Accessor(Vec<String>),
    Procedure {
        name: String,
        /// Set for selector procedures produced from an operator (near, similar)
        selector_op: Option<Operator>,
    },
    Binary {
        op: Operator,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// N-ary combinator; children are evaluated left to right
    Logical { op: Operator, children: Vec<Node> },
    Call {
        procedure: Box<Node>,
        args: Vec<Node>,
    },
    Not(Box<Node>),
}

impl Node {
    pub fn constant(value: impl Into<Value>) -> Self {
        Node::Constant(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Node::Variable(name.into())
    }

    pub fn binary(op: Operator, left: Node, right: Node) -> Self {
        Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn logical(op: Operator, children: Vec<Node>) -> Self {
        Node::Logical { op, children }
    }

    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Self {
        Node::Call {
            procedure: Box::new(Node::Procedure {
                name: name.into(),
                selector_op: None,
            }),
            args,
        }
    }

    pub fn negate(node: Node) -> Self {
        Node::Not(Box::new(node))
    }

    pub fn is_column(&self) -> bool {
        matches!(self, Node::Variable(_) | Node::Accessor(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Node::Constant(_))
    }

    /// Column path of a variable or accessor leaf.
    pub fn column_path(&self) -> Option<Vec<String>> {
        match self {
            Node::Variable(name) => Some(vec![name.clone()]),
            Node::Accessor(path) => Some(path.clone()),
            _ => None,
        }
    }

    /// Procedure name when the node is a call.
    pub fn procedure_name(&self) -> Option<&str> {
        match self {
            Node::Call { procedure, .. } => match procedure.as_ref() {
                Node::Procedure { name, .. } => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}

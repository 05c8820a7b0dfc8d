//! Tape to tree compilation
//!
//! Walks the instruction tape once, keeping a stack of partially built
//! nodes. Same-operator AND/OR chains are flattened into one n-ary node,
//! AND_NOT and ADJUST only absorb their left side.

use super::code::{Code, Expression, Operand};
use super::errors::{ExprError, ExprResult};
use super::node::Node;
use super::operator::Operator;

pub struct Compiler;

impl Compiler {
    /// Compiles a tape into exactly one root node.
    pub fn compile(expr: &Expression) -> ExprResult<Node> {
        let mut stack: Vec<Node> = Vec::new();

        for (offset, code) in expr.codes().iter().enumerate() {
            let node = Self::step(&mut stack, offset, code)?;
            stack.push(node);
        }

        match stack.len() {
            1 => stack
                .pop()
                .ok_or_else(|| ExprError::malformed(expr.len(), "empty stack")),
            0 => Err(ExprError::malformed(0, "empty expression")),
            n => Err(ExprError::malformed(
                expr.len(),
                format!("{} dangling operands", n - 1),
            )),
        }
    }

    fn step(stack: &mut Vec<Node>, offset: usize, code: &Code) -> ExprResult<Node> {
        match code.op {
            Operator::Push => match &code.operand {
                Some(Operand::Constant(value)) => Ok(Node::Constant(value.clone())),
                Some(Operand::Procedure(name)) => Ok(Node::Procedure {
                    name: name.clone(),
                    selector_op: None,
                }),
                Some(Operand::Column(name)) => Ok(Node::Variable(name.clone())),
                Some(Operand::Accessor(path)) => Ok(Node::Accessor(path.clone())),
                None => Err(ExprError::malformed(offset, "push without operand")),
            },
            Operator::GetValue | Operator::GetRef => match &code.operand {
                Some(Operand::Column(name)) => Ok(Node::Variable(name.clone())),
                Some(Operand::Accessor(path)) => Ok(Node::Accessor(path.clone())),
                _ => Err(ExprError::malformed(offset, "column load without column")),
            },
            Operator::Not => {
                let child = pop(stack, offset)?;
                Ok(Node::Not(Box::new(child)))
            }
            Operator::Call => {
                let args = pop_n(stack, offset, code.nargs)?;
                let procedure = pop(stack, offset)?;
                if !matches!(procedure, Node::Procedure { .. }) {
                    return Err(ExprError::malformed(offset, "call target is not a procedure"));
                }
                Ok(Node::Call {
                    procedure: Box::new(procedure),
                    args,
                })
            }
            op if op.is_logical() => {
                let right = pop(stack, offset)?;
                let left = pop(stack, offset)?;
                Ok(Self::combine(op, left, right))
            }
            op @ (Operator::Near | Operator::Similar) if code.nargs == 3 => {
                let args = pop_n(stack, offset, 3)?;
                Ok(Node::Call {
                    procedure: Box::new(Node::Procedure {
                        name: op.as_str().to_string(),
                        selector_op: Some(op),
                    }),
                    args,
                })
            }
            op if op.is_relational() || op.is_arithmetic() || op == Operator::GetMember => {
                if code.nargs != 2 {
                    return Err(ExprError::malformed(
                        offset,
                        format!("{} takes 2 operands, got {}", op.as_str(), code.nargs),
                    ));
                }
                let right = pop(stack, offset)?;
                let left = pop(stack, offset)?;
                Ok(Node::binary(op, left, right))
            }
            op => Err(ExprError::malformed(
                offset,
                format!("unsupported op-code: {}", op.as_str()),
            )),
        }
    }

    fn combine(op: Operator, left: Node, right: Node) -> Node {
        let mut children = match left {
            Node::Logical {
                op: left_op,
                children,
            } if left_op == op => children,
            other => vec![other],
        };
        match right {
            Node::Logical {
                op: right_op,
                children: right_children,
            } if right_op == op && matches!(op, Operator::And | Operator::Or) => {
                children.extend(right_children)
            }
            other => children.push(other),
        }
        Node::Logical { op, children }
    }
}

fn pop(stack: &mut Vec<Node>, offset: usize) -> ExprResult<Node> {
    stack
        .pop()
        .ok_or_else(|| ExprError::malformed(offset, "operand stack underflow"))
}

fn pop_n(stack: &mut Vec<Node>, offset: usize, n: usize) -> ExprResult<Vec<Node>> {
    if stack.len() < n {
        return Err(ExprError::malformed(offset, "operand stack underflow"));
    }
    Ok(stack.split_off(stack.len() - n))
}

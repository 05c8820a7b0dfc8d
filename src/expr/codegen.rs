//! Tree to tape code generation
//!
//! Inverse of the compiler: emits postfix instructions for a node so that
//! rewritten trees can be fed back into the scan-condition builder.

use super::code::Expression;
use super::node::Node;
use super::operator::Operator;

pub struct CodeGenerator;

impl CodeGenerator {
    pub fn generate(node: &Node) -> Expression {
        Self::emit(Expression::new(), node)
    }

    fn emit(expr: Expression, node: &Node) -> Expression {
        match node {
            Node::Constant(value) => expr.constant(value.clone()),
            Node::Variable(name) => expr.column(name.clone()),
            Node::Accessor(path) => expr.accessor(path.iter().cloned()),
            Node::Procedure { name, .. } => expr.procedure(name.clone()),
            Node::Binary { op, left, right } => {
                let expr = Self::emit(expr, left);
                let expr = Self::emit(expr, right);
                expr.operator(*op)
            }
            Node::Logical { op, children } => {
                let mut children = children.iter();
                let mut expr = match children.next() {
                    Some(first) => Self::emit(expr, first),
                    None => return expr,
                };
                for child in children {
                    expr = Self::emit(expr, child).operator(*op);
                }
                expr
            }
            Node::Call { procedure, args } => {
                if let Node::Procedure {
                    selector_op: Some(op),
                    ..
                } = procedure.as_ref()
                {
                    let expr = args.iter().fold(expr, Self::emit);
                    return expr.operator_n(*op, args.len());
                }
                let expr = Self::emit(expr, procedure);
                let expr = args.iter().fold(expr, Self::emit);
                expr.call(args.len())
            }
            Node::Not(child) => Self::emit(expr, child).operator(Operator::Not),
        }
    }
}

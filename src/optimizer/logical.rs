//! Tree rewrites applied before scan planning

use tracing::trace;

use crate::expr::{
    CodeGenerator, Compiler, ExprResult, Expression, Node, Operator, BETWEEN_PROCEDURE,
};
use crate::scan::CardinalityEstimator;
use crate::storage::{Border, Database, Table};

/// Rewrites expression trees into a shape the scan builder plans well.
///
/// Rewrites never change which records match:
///
/// - comparisons get the column on the left (`5 < x` becomes `x > 5`)
/// - AND siblings are grouped by column and a lower and upper bound on the
///   same column collapse into one `between` call
/// - AND siblings are ordered by estimated hit count when a table is given
pub struct LogicalOptimizer<'a> {
    estimator: Option<CardinalityEstimator<'a>>,
}

impl Default for LogicalOptimizer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> LogicalOptimizer<'a> {
    /// Optimizer without statistics: AND siblings keep their order.
    pub fn new() -> Self {
        Self { estimator: None }
    }

    pub fn with_estimates(db: &'a dyn Database, table: &'a dyn Table) -> Self {
        Self {
            estimator: Some(CardinalityEstimator::new(db, table)),
        }
    }

    /// Compiles, rewrites and regenerates a tape.
    pub fn optimize_expression(&self, expr: &Expression) -> ExprResult<Expression> {
        let node = Compiler::compile(expr)?;
        let optimized = self.optimize(node);
        Ok(CodeGenerator::generate(&optimized))
    }

    pub fn optimize(&self, node: Node) -> Node {
        match node {
            Node::Binary { op, left, right } => normalize_comparison(op, *left, *right),
            Node::Logical { op, children } => {
                let children: Vec<Node> = children.into_iter().map(|c| self.optimize(c)).collect();
                if op == Operator::And {
                    self.optimize_and(children)
                } else {
                    Node::logical(op, children)
                }
            }
            Node::Not(child) => Node::negate(self.optimize(*child)),
            Node::Call { procedure, args } => Node::Call {
                procedure,
                args: args.into_iter().map(|a| self.optimize(a)).collect(),
            },
            leaf => leaf,
        }
    }

    fn optimize_and(&self, children: Vec<Node>) -> Node {
        let mut groups: Vec<(Option<Vec<String>>, Vec<Node>)> = Vec::new();
        for child in children {
            let column = bound_column(&child);
            match groups
                .iter_mut()
                .find(|(c, _)| column.is_some() && *c == column)
            {
                Some((_, members)) => members.push(child),
                None => groups.push((column, vec![child])),
            }
        }

        let mut children: Vec<Node> = groups
            .into_iter()
            .flat_map(|(column, members)| match column {
                Some(_) => collapse_between(members),
                None => members,
            })
            .collect();

        if let Some(estimator) = &self.estimator {
            let mut keyed: Vec<(usize, Node)> = children
                .into_iter()
                .map(|child| {
                    let estimated = estimator.estimate_expression(&CodeGenerator::generate(&child));
                    (estimated, child)
                })
                .collect();
            keyed.sort_by_key(|(estimated, _)| *estimated);
            trace!(
                estimates = ?keyed.iter().map(|(e, _)| *e).collect::<Vec<_>>(),
                "AND_SIBLINGS_ORDERED"
            );
            children = keyed.into_iter().map(|(_, child)| child).collect();
        }

        if children.len() == 1 && is_between(&children[0]) {
            return children.remove(0);
        }
        Node::logical(Operator::And, children)
    }
}

/// Puts the column on the left of a comparison against a constant.
fn normalize_comparison(op: Operator, left: Node, right: Node) -> Node {
    match op.mirror() {
        Some(mirrored) if left.is_constant() && right.is_column() => {
            Node::binary(mirrored, right, left)
        }
        _ => Node::binary(op, left, right),
    }
}

/// Column of a `column <op> constant` range comparison.
fn bound_column(node: &Node) -> Option<Vec<String>> {
    match node {
        Node::Binary { op, left, right } if op.is_range() && right.is_constant() => {
            left.column_path()
        }
        _ => None,
    }
}

fn is_between(node: &Node) -> bool {
    node.procedure_name() == Some(BETWEEN_PROCEDURE)
}

/// Pairs lower and upper bounds of one column in order of appearance.
fn collapse_between(members: Vec<Node>) -> Vec<Node> {
    let mut lowers = Vec::new();
    let mut uppers = Vec::new();
    let mut rest = Vec::new();
    for member in members {
        match member {
            Node::Binary { op, left, right } if op.is_lower_bound() => {
                lowers.push((op, *left, *right))
            }
            Node::Binary { op, left, right } => uppers.push((op, *left, *right)),
            other => rest.push(other),
        }
    }

    let border = |inclusive: bool| {
        let border = if inclusive {
            Border::Include
        } else {
            Border::Exclude
        };
        Node::constant(border.as_str())
    };
    let mut collapsed = Vec::new();
    let mut uppers = uppers.into_iter();
    for (lower_op, column, min) in lowers {
        match uppers.next() {
            Some((upper_op, _, max)) => collapsed.push(Node::call(
                BETWEEN_PROCEDURE,
                vec![
                    column,
                    min,
                    border(lower_op == Operator::GreaterEqual),
                    max,
                    border(upper_op == Operator::LessEqual),
                ],
            )),
            None => collapsed.push(Node::binary(lower_op, column, min)),
        }
    }
    collapsed.extend(uppers.map(|(op, column, max)| Node::binary(op, column, max)));
    collapsed.extend(rest);
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryDatabase;
    use crate::storage::{ColumnInfo, IndexKind};
    use crate::value::{Value, ValueType};

    fn cmp(op: Operator, column: &str, value: i64) -> Node {
        Node::binary(op, Node::variable(column), Node::constant(value))
    }

    #[test]
    fn test_constant_moves_right() {
        let node = Node::binary(Operator::Less, Node::constant(5), Node::variable("x"));
        assert_eq!(
            LogicalOptimizer::new().optimize(node),
            cmp(Operator::Greater, "x", 5)
        );
    }

    #[test]
    fn test_bounds_collapse_into_between() {
        let node = Node::logical(
            Operator::And,
            vec![
                cmp(Operator::Less, "x", 10),
                cmp(Operator::Equal, "y", 1),
                cmp(Operator::GreaterEqual, "x", 5),
            ],
        );
        let optimized = LogicalOptimizer::new().optimize(node);
        let expected = Node::logical(
            Operator::And,
            vec![
                Node::call(
                    "between",
                    vec![
                        Node::variable("x"),
                        Node::constant(5),
                        Node::constant("include"),
                        Node::constant(10),
                        Node::constant("exclude"),
                    ],
                ),
                cmp(Operator::Equal, "y", 1),
            ],
        );
        assert_eq!(optimized, expected);
    }

    #[test]
    fn test_lone_between_unwraps() {
        let node = Node::logical(
            Operator::And,
            vec![cmp(Operator::Greater, "x", 1), cmp(Operator::Less, "x", 3)],
        );
        let optimized = LogicalOptimizer::new().optimize(node);
        assert!(is_between(&optimized));
    }

    #[test]
    fn test_or_children_are_not_collapsed() {
        let node = Node::logical(
            Operator::Or,
            vec![cmp(Operator::Greater, "x", 1), cmp(Operator::Less, "x", 3)],
        );
        let optimized = LogicalOptimizer::new().optimize(node.clone());
        assert_eq!(optimized, node);
    }

    #[test]
    fn test_siblings_sorted_by_estimate() {
        let mut db = MemoryDatabase::new();
        let table = db
            .create_table(
                "Items",
                vec![
                    ColumnInfo::new("common", ValueType::Int),
                    ColumnInfo::new("rare", ValueType::Int),
                ],
            )
            .unwrap();
        for i in 0..50 {
            table
                .insert(vec![("common", Value::Int(i % 2)), ("rare", Value::Int(i))])
                .unwrap();
        }
        table.create_index("common", IndexKind::Range).unwrap();
        table.create_index("rare", IndexKind::Range).unwrap();
        let table = db.table("Items").unwrap();

        let node = Node::logical(
            Operator::And,
            vec![cmp(Operator::Equal, "common", 1), cmp(Operator::Equal, "rare", 7)],
        );
        let optimized = LogicalOptimizer::with_estimates(&db, table).optimize(node);
        match optimized {
            Node::Logical { children, .. } => {
                assert_eq!(children[0], cmp(Operator::Equal, "rare", 7));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_optimize_expression_round_trips_tape() {
        let expr = Expression::new()
            .constant(3)
            .column("x")
            .operator(Operator::Less);
        let optimized = LogicalOptimizer::new().optimize_expression(&expr).unwrap();
        let expected = Expression::new()
            .column("x")
            .constant(3)
            .operator(Operator::Greater);
        assert_eq!(optimized, expected);
    }
}

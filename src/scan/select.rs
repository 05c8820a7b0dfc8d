//! Condition-list execution against one table

use tracing::{debug, trace};

use super::builder::{BuildOptions, ScanInfoBuilder};
use super::info::ScanInfo;
use super::resolve::resolve_index;
use crate::expr::{Compiler, Evaluator, ExprError, ExprResult, Expression, Node, Operator};
use crate::storage::{Database, RecordSet, Table, TableRow};
use crate::value::RecordId;

/// Runs filter expressions against a table, using indexes where the
/// condition list allows it.
pub struct TableSelector<'a> {
    db: &'a dyn Database,
    table: &'a dyn Table,
    options: BuildOptions,
}

impl<'a> TableSelector<'a> {
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

    /// Combines the records matching `expr` into `res` with `op`.
    ///
    /// Without `res` the filter starts from an empty result and `op` must
    /// be OR for the filter's own hits to survive.
    pub fn select(
        &self,
        expr: &Expression,
        res: Option<RecordSet>,
        op: Operator,
    ) -> ExprResult<RecordSet> {
        let fresh = res.is_none();
        let res = res.unwrap_or_default();
        let builder = ScanInfoBuilder::new(self.db, self.table).with_options(self.options);
        match builder.build(expr, op, fresh) {
            Ok(sis) => self.execute(expr, &sis, res),
            Err(ExprError::InvalidExpression(reason)) => {
                debug!(table = self.table.name(), reason = %reason, "SEQUENTIAL_SELECT");
                let node = Compiler::compile(expr)?;
                let hits = self.scan(&node, &res, op, 1)?;
                Ok(res.combine(hits, op))
            }
            Err(e) => Err(e),
        }
    }

    /// Interprets the condition list left to right over a result stack.
    pub fn execute(
        &self,
        expr: &Expression,
        sis: &[ScanInfo],
        res: RecordSet,
    ) -> ExprResult<RecordSet> {
        let mut stack: Vec<RecordSet> = Vec::new();
        let mut res = res;
        for si in sis {
            if si.is_pop() {
                let outer = stack
                    .pop()
                    .ok_or_else(|| ExprError::invalid("pop without matching push"))?;
                res = outer.combine(res, si.logical_op);
                continue;
            }
            if si.flags.push {
                stack.push(std::mem::take(&mut res));
            }
            let hits = match self.index_hits(si) {
                Some(hits) => hits,
                None => {
                    let node = si.condition_node(expr)?;
                    self.scan(&node, &res, si.logical_op, si.weight)?
                }
            };
            res = res.combine(hits, si.logical_op);
        }
        if !stack.is_empty() {
            return Err(ExprError::invalid("push without matching pop"));
        }
        Ok(res)
    }

    /// Records matching one condition through its index, `None` when no
    /// index can answer it.
    fn index_hits(&self, si: &ScanInfo) -> Option<RecordSet> {
        if si.indexes.is_empty() || si.flags.computed || si.is_pop() {
            return None;
        }
        let op = if si.between.is_some() {
            Operator::Call
        } else {
            si.effective_op()
        };
        let path = si.column_path()?;
        let resolved = match resolve_index(self.db, self.table, &path, op) {
            Some(resolved) => resolved,
            None => {
                trace!(table = self.table.name(), path = %path.join("."), "INDEX_UNAVAILABLE");
                return None;
            }
        };

        let ids: Vec<RecordId> = match op {
            Operator::Match | Operator::Near | Operator::Similar | Operator::Regexp => {
                resolved.index.search(op, si.query.as_ref()?)?
            }
            Operator::Equal => {
                let key = match resolved.key_type() {
                    Some(ty) => si.query.as_ref()?.cast_to(ty)?,
                    None => si.query.clone()?,
                };
                resolved.index.lookup(&key)
            }
            _ => {
                let range = si.key_range(resolved.key_type())?;
                let mut ids: Vec<RecordId> = resolved.index.cursor(&range).collect();
                ids.sort_unstable();
                ids.dedup();
                ids
            }
        };
        let ids = resolved.map_back(ids);
        trace!(
            table = self.table.name(),
            index = resolved.index.name(),
            hits = ids.len(),
            "INDEX_HITS"
        );
        Some(RecordSet::from_ids(ids, si.weight))
    }

    /// Evaluates `node` record by record.
    ///
    /// OR considers every record; the other combinators can only keep or
    /// rescore records already in `res`.
    fn scan(&self, node: &Node, res: &RecordSet, op: Operator, weight: i32) -> ExprResult<RecordSet> {
        let candidates: Vec<RecordId> = if op == Operator::Or {
            self.table.record_ids().collect()
        } else {
            res.ids().collect()
        };
        let mut hits = RecordSet::new();
        for id in candidates {
            let row = TableRow::with_database(self.db, self.table, id);
            if Evaluator::matches(node, &row)? {
                hits.add(id, weight);
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryDatabase;
    use crate::storage::{ColumnInfo, IndexKind};
    use crate::value::{Value, ValueType};

    fn fixture() -> MemoryDatabase {
        let mut db = MemoryDatabase::new();
        let table = db
            .create_table(
                "Docs",
                vec![
                    ColumnInfo::new("n", ValueType::Int),
                    ColumnInfo::new("body", ValueType::Text),
                ],
            )
            .unwrap();
        for i in 1..=10 {
            let body = if i % 2 == 0 { "red fox" } else { "blue hen" };
            table
                .insert(vec![("n", Value::Int(i)), ("body", Value::text(body))])
                .unwrap();
        }
        table.create_index("n", IndexKind::Range).unwrap();
        table.create_index("body", IndexKind::FullText).unwrap();
        db
    }

    fn cond(column: &str, op: Operator, value: impl Into<Value>) -> Expression {
        Expression::new().column(column).constant(value).operator(op)
    }

    fn select(db: &MemoryDatabase, expr: &Expression) -> Vec<RecordId> {
        let table = db.table("Docs").unwrap();
        TableSelector::new(db, table)
            .select(expr, None, Operator::Or)
            .unwrap()
            .ids()
            .collect()
    }

    #[test]
    fn test_indexed_range_and_match() {
        let db = fixture();
        let expr = cond("n", Operator::Greater, 3)
            .and_then(&cond("n", Operator::LessEqual, 8), Operator::And)
            .and_then(&cond("body", Operator::Match, "fox"), Operator::And);
        assert_eq!(select(&db, &expr), vec![4, 6, 8]);
    }

    #[test]
    fn test_nested_groups() {
        // n < 3 OR (body @ fox AND n > 6)
        let db = fixture();
        let right = cond("body", Operator::Match, "fox")
            .and_then(&cond("n", Operator::Greater, 6), Operator::And);
        let expr = cond("n", Operator::Less, 3).and_then(&right, Operator::Or);
        assert_eq!(select(&db, &expr), vec![1, 2, 8, 10]);
    }

    #[test]
    fn test_and_not_of_text_predicate() {
        let db = fixture();
        let expr = cond("n", Operator::LessEqual, 4)
            .and_then(&cond("body", Operator::Match, "fox").not(), Operator::And);
        assert_eq!(select(&db, &expr), vec![1, 3]);
    }

    #[test]
    fn test_unbuildable_expression_evaluates_sequentially() {
        let db = fixture();
        // Two columns in one comparison cannot become a scan condition
        let expr = Expression::new()
            .column("n")
            .column("n")
            .operator(Operator::Equal);
        assert_eq!(select(&db, &expr).len(), 10);
    }

    #[test]
    fn test_combines_into_existing_result() {
        let db = fixture();
        let table = db.table("Docs").unwrap();
        let base = RecordSet::from_ids([1, 2, 3, 4], 1);
        let res = TableSelector::new(&db, table)
            .select(&cond("body", Operator::Match, "fox"), Some(base), Operator::And)
            .unwrap();
        assert_eq!(res.ids().collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test]
    fn test_malformed_expression_is_an_error() {
        let db = fixture();
        let table = db.table("Docs").unwrap();
        let expr = Expression::new().operator(Operator::Equal);
        let result = TableSelector::new(&db, table).select(&expr, None, Operator::Or);
        assert!(matches!(result, Err(ExprError::MalformedExpression { .. })));
    }
}

//! Scan conditions

use crate::expr::{
    parse_border, Compiler, ExprResult, Expression, Node, Operand, Operator,
    ALL_RECORDS_PROCEDURE, BETWEEN_PROCEDURE, DEFAULT_MAX_INTERVAL, DEFAULT_SIMILARITY_THRESHOLD,
};
use crate::storage::{Border, KeyRange};
use crate::value::{Value, ValueType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanFlags {
    /// Starts a nested group: the running result is stacked
    pub push: bool,
    /// Closes a group: combines with the stacked result
    pub pop: bool,
    /// The target column is reached through a reference chain
    pub accessor: bool,
    /// Constant precedes the column (`5 < x`)
    pub pre_const: bool,
    /// The compared value is computed, no index can answer it
    pub computed: bool,
}

/// An index able to answer a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRef {
    /// Column path from the scanned table to the indexed column
    pub path: Vec<String>,
    pub index: String,
    pub section: u32,
    pub weight: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetweenRange {
    pub min: Value,
    pub min_border: Border,
    pub max: Value,
    pub max_border: Border,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanInfo {
    /// First instruction of the condition
    pub start: usize,
    /// Last instruction of the condition
    pub end: usize,
    pub op: Operator,
    /// How the condition's hits merge into the running result
    pub logical_op: Operator,
    pub flags: ScanFlags,
    pub args: Vec<Operand>,
    pub query: Option<Value>,
    pub indexes: Vec<IndexRef>,
    pub weight: i32,
    pub max_interval: i64,
    pub similarity_threshold: i64,
    pub between: Option<BetweenRange>,
}

impl ScanInfo {
    pub fn new(start: usize) -> Self {
        Self {
            start,
            end: start,
            op: Operator::Push,
            logical_op: Operator::Or,
            flags: ScanFlags {
                push: true,
                ..ScanFlags::default()
            },
            args: Vec::new(),
            query: None,
            indexes: Vec::new(),
            weight: 1,
            max_interval: DEFAULT_MAX_INTERVAL,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            between: None,
        }
    }

    /// Group terminator combining with `logical_op`.
    pub fn pop_marker(logical_op: Operator, position: usize) -> Self {
        let mut si = Self::new(position);
        si.logical_op = logical_op;
        si.flags = ScanFlags {
            pop: true,
            ..ScanFlags::default()
        };
        si
    }

    /// Condition matching every record.
    pub fn all_records(start: usize) -> Self {
        let mut si = Self::new(start);
        si.op = Operator::Call;
        si.args = vec![Operand::Procedure(ALL_RECORDS_PROCEDURE.to_string())];
        si
    }

    /// Merged range condition covering the instructions of `lower` and `upper`.
    pub fn between_of(lower: &ScanInfo, upper: &ScanInfo, range: BetweenRange) -> Self {
        let mut args = vec![Operand::Procedure(BETWEEN_PROCEDURE.to_string())];
        args.extend(lower.column_operand().cloned());
        Self {
            start: lower.start,
            end: upper.end,
            op: Operator::Call,
            logical_op: lower.logical_op,
            flags: ScanFlags {
                pre_const: false,
                ..lower.flags
            },
            args,
            query: None,
            indexes: lower.indexes.clone(),
            weight: lower.weight + upper.weight,
            max_interval: DEFAULT_MAX_INTERVAL,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            between: Some(range),
        }
    }

    pub fn is_pop(&self) -> bool {
        self.flags.pop
    }

    pub fn is_all_records(&self) -> bool {
        self.procedure() == Some(ALL_RECORDS_PROCEDURE)
    }

    pub fn procedure(&self) -> Option<&str> {
        match self.args.first() {
            Some(Operand::Procedure(name)) if self.op == Operator::Call => Some(name),
            _ => None,
        }
    }

    /// First column or accessor argument.
    pub fn column_operand(&self) -> Option<&Operand> {
        self.args.iter().find(|a| a.is_column())
    }

    pub fn column_path(&self) -> Option<Vec<String>> {
        self.column_operand().and_then(Operand::column_path)
    }

    /// The operator as if the column were the left operand.
    pub fn effective_op(&self) -> Operator {
        if self.flags.pre_const {
            self.op.mirror().unwrap_or(self.op)
        } else {
            self.op
        }
    }

    /// Key range the condition selects, with constants cast to `key_type`.
    pub fn key_range(&self, key_type: Option<ValueType>) -> Option<KeyRange> {
        let cast = |value: &Value| match key_type {
            Some(ty) => value.cast_to(ty),
            None => Some(value.clone()),
        };
        if let Some(between) = &self.between {
            return Some(
                KeyRange::all()
                    .with_min(cast(&between.min)?, between.min_border)
                    .with_max(cast(&between.max)?, between.max_border),
            );
        }
        let query = self.query.as_ref()?;
        let range = match self.effective_op() {
            Operator::Less => KeyRange::all().with_max(cast(query)?, Border::Exclude),
            Operator::LessEqual => KeyRange::all().with_max(cast(query)?, Border::Include),
            Operator::Greater => KeyRange::all().with_min(cast(query)?, Border::Exclude),
            Operator::GreaterEqual => KeyRange::all().with_min(cast(query)?, Border::Include),
            Operator::Equal => {
                let key = cast(query)?;
                KeyRange::all()
                    .with_min(key.clone(), Border::Include)
                    .with_max(key, Border::Include)
            }
            Operator::Prefix => KeyRange::prefix(query.as_text()?),
            _ => return None,
        };
        Some(range)
    }

    /// Reads query, NEAR/SIMILAR options and between bounds from the arguments.
    pub(crate) fn derive_operands(&mut self) -> ExprResult<()> {
        if self.op == Operator::Call {
            if self.procedure() == Some(BETWEEN_PROCEDURE) {
                self.between = parse_between(&self.args[1..])?;
            }
            return Ok(());
        }
        let mut constants = self.args.iter().filter_map(Operand::as_constant);
        self.query = constants.next().cloned();
        if let Some(option) = constants.next().and_then(Value::as_int) {
            match self.op {
                Operator::Near => self.max_interval = option,
                Operator::Similar => self.similarity_threshold = option,
                _ => {}
            }
        }
        Ok(())
    }

    /// Tree form used when the condition is evaluated record by record.
    pub fn condition_node(&self, expr: &Expression) -> ExprResult<Node> {
        if self.is_all_records() {
            return Ok(Node::call(ALL_RECORDS_PROCEDURE, Vec::new()));
        }
        if let (Some(between), Some(path)) = (&self.between, self.column_path()) {
            let column = if path.len() == 1 {
                Node::Variable(path[0].clone())
            } else {
                Node::Accessor(path)
            };
            return Ok(Node::call(
                BETWEEN_PROCEDURE,
                vec![
                    column,
                    Node::Constant(between.min.clone()),
                    Node::constant(between.min_border.as_str()),
                    Node::Constant(between.max.clone()),
                    Node::constant(between.max_border.as_str()),
                ],
            ));
        }
        Compiler::compile(&expr.slice(self.start, self.end))
    }
}

/// `column, min, [min_border,] max [, max_border]` with constant bounds.
fn parse_between(args: &[Operand]) -> ExprResult<Option<BetweenRange>> {
    let column_first = args.first().is_some_and(Operand::is_column);
    let constants: Option<Vec<&Value>> = args.iter().skip(1).map(Operand::as_constant).collect();
    let constants = match (column_first, constants) {
        (true, Some(constants)) => constants,
        _ => return Ok(None),
    };
    let range = match constants.as_slice() {
        [min, max] => BetweenRange {
            min: (*min).clone(),
            min_border: Border::Include,
            max: (*max).clone(),
            max_border: Border::Include,
        },
        [min, min_border, max, max_border] => BetweenRange {
            min: (*min).clone(),
            min_border: parse_border(min_border)?,
            max: (*max).clone(),
            max_border: parse_border(max_border)?,
        },
        _ => return Ok(None),
    };
    Ok(Some(range))
}

//! Instruction op-codes

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    // Operand loads
    Push,
    GetValue,
    GetRef,
    GetMember,
    Call,

    // Logical combinators
    And,
    Or,
    AndNot,
    Adjust,
    Not,

    // Relational
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Match,
    Near,
    Similar,
    Prefix,
    Suffix,
    Regexp,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Mod,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Push => "push",
            Operator::GetValue => "get_value",
            Operator::GetRef => "get_ref",
            Operator::GetMember => "get_member",
            Operator::Call => "call",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::AndNot => "and_not",
            Operator::Adjust => "adjust",
            Operator::Not => "not",
            Operator::Equal => "equal",
            Operator::NotEqual => "not_equal",
            Operator::Less => "less",
            Operator::Greater => "greater",
            Operator::LessEqual => "less_equal",
            Operator::GreaterEqual => "greater_equal",
            Operator::Match => "match",
            Operator::Near => "near",
            Operator::Similar => "similar",
            Operator::Prefix => "prefix",
            Operator::Suffix => "suffix",
            Operator::Regexp => "regexp",
            Operator::Plus => "plus",
            Operator::Minus => "minus",
            Operator::Star => "star",
            Operator::Slash => "slash",
            Operator::Mod => "mod",
        }
    }

    /// Operators that close one scan condition.
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::Greater
                | Operator::LessEqual
                | Operator::GreaterEqual
                | Operator::Match
                | Operator::Near
                | Operator::Similar
                | Operator::Prefix
                | Operator::Suffix
                | Operator::Regexp
        )
    }

    /// Binary set combinators.
    pub fn is_logical(&self) -> bool {
        matches!(
            self,
            Operator::And | Operator::Or | Operator::AndNot | Operator::Adjust
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Operator::Plus | Operator::Minus | Operator::Star | Operator::Slash | Operator::Mod
        )
    }

    pub fn is_range(&self) -> bool {
        self.is_lower_bound() || self.is_upper_bound()
    }

    /// `>` and `>=`
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Operator::Greater | Operator::GreaterEqual)
    }

    /// `<` and `<=`
    pub fn is_upper_bound(&self) -> bool {
        matches!(self, Operator::Less | Operator::LessEqual)
    }

    /// Text predicates that take a query string.
    pub fn is_text_search(&self) -> bool {
        matches!(
            self,
            Operator::Match
                | Operator::Near
                | Operator::Similar
                | Operator::Prefix
                | Operator::Suffix
                | Operator::Regexp
        )
    }

    /// Logical complement of a comparison, if it has one.
    pub fn complement(&self) -> Option<Operator> {
        match self {
            Operator::Less => Some(Operator::GreaterEqual),
            Operator::GreaterEqual => Some(Operator::Less),
            Operator::Greater => Some(Operator::LessEqual),
            Operator::LessEqual => Some(Operator::Greater),
            Operator::Equal => Some(Operator::NotEqual),
            Operator::NotEqual => Some(Operator::Equal),
            _ => None,
        }
    }

    /// Operator to use when the two operands trade places.
    pub fn mirror(&self) -> Option<Operator> {
        match self {
            Operator::Less => Some(Operator::Greater),
            Operator::Greater => Some(Operator::Less),
            Operator::LessEqual => Some(Operator::GreaterEqual),
            Operator::GreaterEqual => Some(Operator::LessEqual),
            Operator::Equal => Some(Operator::Equal),
            Operator::NotEqual => Some(Operator::NotEqual),
            _ => None,
        }
    }

    /// Default operand count consumed by the op-code.
    pub fn default_nargs(&self) -> usize {
        match self {
            Operator::Push | Operator::GetValue | Operator::GetRef => 0,
            Operator::Not => 1,
            Operator::Call => 0,
            _ => 2,
        }
    }
}

//! Expression error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The tape does not describe a single well-formed tree
    #[error("malformed expression at instruction {offset}: {reason}")]
    MalformedExpression { offset: usize, reason: String },

    /// The tape cannot be turned into scan conditions
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),

    #[error("invalid regular expression {pattern:?}: {reason}")]
    InvalidRegexp { pattern: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl ExprError {
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        ExprError::MalformedExpression {
            offset,
            reason: reason.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        ExprError::InvalidExpression(reason.into())
    }
}

pub type ExprResult<T> = Result<T, ExprError>;

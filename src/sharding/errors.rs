//! Sharding error types
//!
//! Error codes:
//! - SHARD_INVALID_ARGUMENT
//! - SHARD_NO_SUCH_SHARD
//! - SHARD_MALFORMED_EXPRESSION
//! - SHARD_INVALID_EXPRESSION
//! - SHARD_EVALUATION_FAILURE
//! - SHARD_STORAGE_FAILURE
//! - SHARD_OUTPUT_FAILURE

use thiserror::Error;

use crate::expr::ExprError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ShardingError {
    /// Missing or badly formed parameter
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The logical table has no physical shard
    #[error("no shard for logical table: {0}")]
    NoSuchShard(String),

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A result could not be rendered as JSON
    #[error("output serialization failed: {0}")]
    Output(#[from] serde_json::Error),
}

impl ShardingError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Stable code for command output.
    pub fn code(&self) -> &'static str {
        match self {
            ShardingError::InvalidArgument(_) => "SHARD_INVALID_ARGUMENT",
            ShardingError::NoSuchShard(_) => "SHARD_NO_SUCH_SHARD",
            ShardingError::Expression(ExprError::MalformedExpression { .. }) => {
                "SHARD_MALFORMED_EXPRESSION"
            }
            ShardingError::Expression(ExprError::InvalidExpression(_)) => {
                "SHARD_INVALID_EXPRESSION"
            }
            ShardingError::Expression(ExprError::InvalidArgument(_)) => "SHARD_INVALID_ARGUMENT",
            ShardingError::Expression(_) => "SHARD_EVALUATION_FAILURE",
            ShardingError::Storage(_) => "SHARD_STORAGE_FAILURE",
            ShardingError::Output(_) => "SHARD_OUTPUT_FAILURE",
        }
    }
}

pub type ShardingResult<T> = Result<T, ShardingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            ShardingError::invalid_argument("x").code(),
            "SHARD_INVALID_ARGUMENT"
        );
        assert_eq!(
            ShardingError::NoSuchShard("Logs".into()).code(),
            "SHARD_NO_SUCH_SHARD"
        );
        let malformed: ShardingError = ExprError::malformed(3, "underflow").into();
        assert_eq!(malformed.code(), "SHARD_MALFORMED_EXPRESSION");
        let storage: ShardingError = StorageError::NoSuchTable("T".into()).into();
        assert_eq!(storage.code(), "SHARD_STORAGE_FAILURE");
    }

    #[test]
    fn test_display_keeps_source_message() {
        let err: ShardingError = ExprError::UnknownColumn("level".into()).into();
        assert!(err.to_string().contains("level"));
    }
}

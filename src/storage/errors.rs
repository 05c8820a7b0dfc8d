//! Storage error types

use thiserror::Error;

use crate::value::ValueType;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("no such column: {table}.{column}")]
    NoSuchColumn { table: String, column: String },

    #[error("table already exists: {0}")]
    DuplicateTable(String),

    #[error("index already exists on {table}.{column}")]
    DuplicateIndex { table: String, column: String },

    #[error("type mismatch on {column}: expected {expected:?}")]
    TypeMismatch { column: String, expected: ValueType },

    #[error("invalid key for table {table}: {reason}")]
    InvalidKey { table: String, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

//! Filter expressions
//!
//! A filter arrives as a postfix instruction tape ([`Expression`]). This
//! module turns the tape into a tree ([`Node`]), turns trees back into
//! tapes, and evaluates trees against single rows.
//!
//! # Design Principles
//!
//! - The tape is immutable once built; every later stage reads it
//! - Compilation either yields exactly one root or fails with the offset
//!   of the offending instruction
//! - Evaluation never guesses: unknown columns and procedures are errors
//!
//! # Invariants
//!
//! - Compiling the output of code generation yields the original tree
//! - AND/OR chains are flattened, AND_NOT and ADJUST only on the left

mod code;
mod codegen;
mod compiler;
mod errors;
mod eval;
mod node;
mod operator;

pub use code::{Code, Expression, Operand};
pub use codegen::CodeGenerator;
pub use compiler::Compiler;
pub use errors::{ExprError, ExprResult};
pub use eval::{
    Evaluator, ALL_RECORDS_PROCEDURE, BETWEEN_PROCEDURE, DEFAULT_MAX_INTERVAL,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub(crate) use eval::parse_border;
pub use node::Node;
pub use operator::Operator;

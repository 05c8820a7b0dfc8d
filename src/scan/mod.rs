//! Scan planning
//!
//! Turns a filter tape into a flat list of index-aware scan conditions,
//! estimates how many records each one hits, and executes the list
//! against a table.
//!
//! # Design Principles
//!
//! - Conditions live in one growable array; grouping is expressed with
//!   PUSH/POP flags and fixed up by index manipulation, never by pointers
//! - Estimates err upward: a condition no index can answer hits the
//!   whole table
//! - Any condition the index layer cannot answer is evaluated row by row
//!   over its own instruction span
//!
//! # Invariants
//!
//! - Executing a condition list yields exactly the records the source
//!   tree matches
//! - Range merging and reordering never regroup an OR-joined condition
//! - `estimate` never exceeds the table size

mod builder;
mod estimate;
mod info;
mod optimize;
mod resolve;
mod select;

pub use builder::{BuildOptions, ScanInfoBuilder};
pub(crate) use builder::put_logical_op;
pub use estimate::{regexp_literal, sampling_limit, CardinalityEstimator};
pub use info::{BetweenRange, IndexRef, ScanFlags, ScanInfo};
pub use optimize::{merge_ranges, reorder_by_estimate};
pub use resolve::{resolve_index, ResolvedIndex};
pub use select::TableSelector;

//! Expression-tree optimizer
//!
//! Runs on the compiled tree, before the scan builder sees the tape. The
//! scan builder performs its own list-level range merge and reordering;
//! this pass catches what only the tree shape reveals, such as bounds on
//! one column that are not adjacent in the tape.
//!
//! # Invariants
//!
//! - An optimized tree matches exactly the records of its input
//! - Only AND siblings are regrouped or reordered

mod logical;

pub use logical::LogicalOptimizer;

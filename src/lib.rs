//! shardscan - query planning and sharded execution over time-partitioned
//! column tables
//!
//! A filter expression is compiled into index-aware scan conditions,
//! optimized by estimated selectivity, and executed across the date-keyed
//! shards of a logical table.

pub mod commands;
pub mod config;
pub mod expr;
pub mod optimizer;
pub mod scan;
pub mod sharding;
pub mod storage;
pub mod value;

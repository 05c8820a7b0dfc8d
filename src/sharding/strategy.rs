//! Per-shard strategy selection
//!
//! A range-index scan walks the shard key index in the requested order and
//! stops after `offset + limit` matches; a filtered scan evaluates the whole
//! shard and sorts afterwards. The index scan only pays off when matches are
//! dense enough that the walk ends early.

use tracing::debug;

use super::context::ExecutionContext;

/// Tables up to this size are sampled whole when computing the unmatched
/// budget.
const SMALL_TABLE_SIZE: usize = 10_000;

/// Decides whether a shard is read through its shard-key index.
///
/// `estimate` is only called when no cheaper rule decides.
pub fn use_range_index(
    ctx: &ExecutionContext,
    shard_size: usize,
    estimate: impl FnOnce() -> usize,
) -> bool {
    if let Some(forced) = ctx.use_range_index {
        debug!(decision = forced, reason = "query", "RANGE_INDEX_DECISION");
        return forced;
    }
    if let Some(forced) = ctx.config.use_range_index {
        debug!(decision = forced, reason = "global", "RANGE_INDEX_DECISION");
        return forced;
    }
    let limit = match ctx.remaining() {
        Some(limit) => limit,
        None => {
            debug!(decision = false, reason = "unbounded_limit", "RANGE_INDEX_DECISION");
            return false;
        }
    };
    let wanted = ctx.current_offset.saturating_add(limit);
    if wanted >= shard_size {
        debug!(
            decision = false,
            reason = "whole_shard",
            wanted,
            shard_size,
            "RANGE_INDEX_DECISION"
        );
        return false;
    }

    let threshold = ctx.config.range_index_threshold;
    if threshold <= 0.0 {
        return true;
    }
    if threshold >= 1.0 {
        return false;
    }

    let estimated = estimate();
    let ratio = estimated as f64 / shard_size as f64;
    let decision = estimated > wanted && ratio >= threshold;
    debug!(
        decision,
        estimated,
        wanted,
        shard_size,
        threshold,
        "RANGE_INDEX_DECISION"
    );
    decision
}

/// Scanned-but-unmatched records an index scan may visit before giving up.
///
/// `min(limit * ratio, sample)` where `sample` is the data size for small
/// tables and `data_size / ln(data_size)^2` above.
pub fn max_unmatched(data_size: usize, limit: usize, ratio: u64) -> usize {
    let by_limit = limit.saturating_mul(usize::try_from(ratio).unwrap_or(usize::MAX));
    let sample = if data_size <= SMALL_TABLE_SIZE {
        data_size
    } else {
        let size = data_size as f64;
        (size / size.ln().powi(2)).ceil() as usize
    };
    by_limit.min(sample)
}

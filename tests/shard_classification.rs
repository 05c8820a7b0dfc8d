//! Shard Classification Tests
//!
//! Tests for how shards are discovered and how much of each a query range
//! covers:
//! - month shards narrowed by a following day shard
//! - cover types agreeing with instant-by-instant containment
//! - records on shard boundaries

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use shardscan::config::Config;
use shardscan::sharding::{
    CountRequest, CoverType, RangeFilterRequest, ShardEnumerator, ShardRange, ShardedExecutor,
    TargetRange,
};
use shardscan::storage::memory::MemoryDatabase;
use shardscan::storage::{Border, ColumnInfo, IndexKind, Order};
use shardscan::value::{parse_time, Value, ValueType};

// =============================================================================
// Helper Functions
// =============================================================================

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// `Logs_202401` (month) followed by `Logs_20240115` (day), with one
/// record at each of `month_times` and `day_times`.
fn month_and_day(month_times: &[&str], day_times: &[&str]) -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    for (name, times) in [("Logs_202401", month_times), ("Logs_20240115", day_times)] {
        let table = db
            .create_table(name, vec![ColumnInfo::new("timestamp", ValueType::Time)])
            .unwrap();
        for time in times {
            table
                .insert(vec![("timestamp", Value::Time(parse_time(time).unwrap()))])
                .unwrap();
        }
        table.create_index("timestamp", IndexKind::Range).unwrap();
    }
    db
}

fn timestamps(db: &MemoryDatabase, request: &RangeFilterRequest) -> Vec<Value> {
    let executor = ShardedExecutor::new(db, Config::default());
    let result = executor.logical_range_filter(request).unwrap();
    let position = result
        .columns
        .iter()
        .position(|c| c.name == "timestamp")
        .unwrap();
    result.records.iter().map(|r| r[position].clone()).collect()
}

fn time_value(text: &str) -> Value {
    Value::Time(parse_time(text).unwrap())
}

/// Half-hour instants of a shard, first to last.
fn instants(shard: &ShardRange) -> Vec<NaiveDateTime> {
    let mut instants = Vec::new();
    let mut time = shard.min_time();
    while time < shard.least_over_time() {
        instants.push(time);
        time += Duration::minutes(30);
    }
    instants
}

// =============================================================================
// Enumeration Tests
// =============================================================================

#[test]
fn test_month_shard_ends_where_day_shard_begins() {
    let db = month_and_day(&[], &[]);
    let shards = ShardEnumerator::new(&db, "Logs")
        .unwrap()
        .enumerate(Order::Ascending)
        .unwrap();
    assert_eq!(shards.len(), 2);
    assert_eq!(shards[0].range.max_day, Some(15));
    assert_eq!(shards[0].range.least_over_time(), at(15, 0));
    assert_eq!(shards[1].range.min_time(), at(15, 0));
}

#[test]
fn test_lone_month_shard_covers_whole_month() {
    let mut db = MemoryDatabase::new();
    db.create_table("Logs_202402", vec![ColumnInfo::new("timestamp", ValueType::Time)])
        .unwrap();
    let shards = ShardEnumerator::new(&db, "Logs")
        .unwrap()
        .enumerate(Order::Descending)
        .unwrap();
    assert_eq!(shards.len(), 1);
    assert_eq!(shards[0].range.max_day, None);
    assert_eq!(shards[0].range.least_over_time(), parse_time("2024-03-01 00:00:00").unwrap());
}

/// A range across the month/day boundary reads the tail of the month shard
/// and the head of the day shard.
#[test]
fn test_range_across_month_and_day_shards() {
    let db = month_and_day(
        &["2024-01-10 00:00:00", "2024-01-14 18:00:00"],
        &["2024-01-15 06:00:00", "2024-01-15 18:00:00"],
    );
    let target = TargetRange::unbounded()
        .with_min(at(14, 12), Border::Include)
        .with_max(at(15, 12), Border::Include);
    let request = RangeFilterRequest::new("Logs", "timestamp").with_target(target);
    assert_eq!(
        timestamps(&db, &request),
        vec![time_value("2024-01-14 18:00:00"), time_value("2024-01-15 06:00:00")]
    );

    let descending = request.with_order(Order::Descending);
    assert_eq!(
        timestamps(&db, &descending),
        vec![time_value("2024-01-15 06:00:00"), time_value("2024-01-14 18:00:00")]
    );
}

// =============================================================================
// Boundary Tests
// =============================================================================

/// Records at exactly the range bounds follow the borders.
#[test]
fn test_boundary_instants_follow_borders() {
    let db = month_and_day(
        &["2024-01-14 00:00:00"],
        &["2024-01-15 00:00:00", "2024-01-15 12:00:00"],
    );
    let executor = ShardedExecutor::new(&db, Config::default());
    let count = |min: Border, max: Border| {
        let target = TargetRange::unbounded()
            .with_min(at(14, 0), min)
            .with_max(at(15, 0), max);
        executor
            .logical_count(&CountRequest::new("Logs", "timestamp").with_target(target))
            .unwrap()
    };
    assert_eq!(count(Border::Include, Border::Include), 2);
    assert_eq!(count(Border::Exclude, Border::Include), 1);
    assert_eq!(count(Border::Include, Border::Exclude), 1);
    assert_eq!(count(Border::Exclude, Border::Exclude), 0);
}

/// A range ending exactly where a day shard begins never touches it.
#[test]
fn test_exclusive_max_at_shard_start() {
    let shard = ShardRange::new(2024, 1, Some(15)).unwrap();
    let target = TargetRange::unbounded().with_max(at(15, 0), Border::Exclude);
    assert_eq!(shard.cover_type(&target), CoverType::None);
    let target = TargetRange::unbounded().with_max(at(15, 0), Border::Include);
    assert_eq!(shard.cover_type(&target), CoverType::PartialMax);
}

// =============================================================================
// Properties
// =============================================================================

fn border() -> impl Strategy<Value = Border> {
    prop_oneof![Just(Border::Include), Just(Border::Exclude)]
}

/// Bounds on the hour grid between 2024-01-08 and 2024-01-14.
fn bound() -> impl Strategy<Value = Option<(NaiveDateTime, Border)>> {
    prop::option::of(((0i64..144), border()).prop_map(|(hours, border)| {
        (at(8, 0) + Duration::hours(hours), border)
    }))
}

fn target() -> impl Strategy<Value = TargetRange> {
    (bound(), bound()).prop_map(|(min, max)| {
        let mut target = TargetRange::unbounded();
        if let Some((min, border)) = min {
            target = target.with_min(min, border);
        }
        if let Some((max, border)) = max {
            target = target.with_max(max, border);
        }
        target
    })
}

fn shard() -> impl Strategy<Value = ShardRange> {
    prop_oneof![
        (8u32..14).prop_map(|day| ShardRange::new(2024, 1, Some(day)).unwrap()),
        (9u32..14).prop_map(|max_day| ShardRange::new(2024, 1, None).unwrap().with_max_day(max_day)),
        Just(ShardRange::new(2024, 1, None).unwrap()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Every shard gets exactly one cover type, `None` exactly when no
    /// instant of the shard is in range, and partial bounds exactly
    /// where the range cuts the shard.
    #[test]
    fn test_cover_type_matches_containment(shard in shard(), target in target()) {
        let instants = instants(&shard);
        let cover = shard.cover_type(&target);
        let any_inside = instants.iter().any(|t| target.contains(*t));
        prop_assert_eq!(cover == CoverType::None, !any_inside);
        if cover == CoverType::None {
            return Ok(());
        }

        let lower = TargetRange { max: None, ..target.clone() };
        let upper = TargetRange { min: None, ..target.clone() };
        let min_cut = !lower.contains(shard.min_time());
        let max_cut = instants.last().is_some_and(|last| !upper.contains(*last));
        let expected = match (min_cut, max_cut) {
            (true, true) => CoverType::PartialMinAndMax,
            (true, false) => CoverType::PartialMin,
            (false, true) => CoverType::PartialMax,
            (false, false) => CoverType::All,
        };
        prop_assert_eq!(cover, expected);

        if cover == CoverType::All {
            prop_assert!(instants.iter().all(|t| target.contains(*t)));
        }
    }
}

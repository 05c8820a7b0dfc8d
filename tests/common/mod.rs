//! Shared fixtures for integration tests

#![allow(dead_code)]

use shardscan::storage::memory::MemoryDatabase;
use shardscan::storage::{ColumnInfo, IndexKind};
use shardscan::value::{parse_time, Value, ValueType};

/// Words used by the `body` column of [`document_table`].
pub const WORDS: &[&str] = &["fox", "dog", "cat", "owl"];

/// One table `Docs` of 40 records followed by three records with nulls.
///
/// - `n`: 0..20 twice, range indexed
/// - `m`: `id % 5`, not indexed
/// - `body`: two words of [`WORDS`], full-text indexed
///
/// The trailing records are `{n: null, m: 2, body: "fox owl"}`,
/// `{n: 3, m: null, body: null}` and one record that is null everywhere.
pub fn document_table() -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    let table = db
        .create_table(
            "Docs",
            vec![
                ColumnInfo::new("n", ValueType::Int),
                ColumnInfo::new("m", ValueType::Int),
                ColumnInfo::new("body", ValueType::Text),
            ],
        )
        .unwrap();
    for i in 0..40i64 {
        let first = WORDS[(i % 4) as usize];
        let second = WORDS[((i / 4) % 4) as usize];
        table
            .insert(vec![
                ("n", Value::Int(i % 20)),
                ("m", Value::Int(i % 5)),
                ("body", Value::text(format!("{} {}", first, second))),
            ])
            .unwrap();
    }
    table
        .insert(vec![("m", Value::Int(2)), ("body", Value::text("fox owl"))])
        .unwrap();
    table.insert(vec![("n", Value::Int(3))]).unwrap();
    table.insert(vec![]).unwrap();
    table.create_index("n", IndexKind::Range).unwrap();
    table.create_index("body", IndexKind::FullText).unwrap();
    db
}

/// Logical table `Logs` with one day shard per entry of `sizes`, starting
/// 2024-01-01.
///
/// Records are an hour apart from midnight. `seq` numbers records from 1
/// across all shards; `level` alternates `info`/`warn` starting with `info`.
pub fn log_shards(sizes: &[usize], indexed: bool) -> MemoryDatabase {
    build_log_shards(sizes, indexed, false)
}

/// [`log_shards`] where every shard also starts with a `warn` record that
/// has no timestamp. Its `seq` is minus the shard's day.
pub fn log_shards_with_null_keys(sizes: &[usize], indexed: bool) -> MemoryDatabase {
    build_log_shards(sizes, indexed, true)
}

fn build_log_shards(sizes: &[usize], indexed: bool, null_keys: bool) -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    let mut seq = 0i64;
    for (day, size) in sizes.iter().enumerate() {
        let table = db
            .create_table(
                &format!("Logs_202401{:02}", day + 1),
                vec![
                    ColumnInfo::new("timestamp", ValueType::Time),
                    ColumnInfo::new("seq", ValueType::Int),
                    ColumnInfo::new("level", ValueType::Text),
                ],
            )
            .unwrap();
        if null_keys {
            table
                .insert(vec![
                    ("seq", Value::Int(-(day as i64 + 1))),
                    ("level", Value::text("warn")),
                ])
                .unwrap();
        }
        for hour in 0..*size {
            seq += 1;
            let time = parse_time(&format!("2024-01-{:02} {:02}:00:00", day + 1, hour)).unwrap();
            let level = if seq % 2 == 1 { "info" } else { "warn" };
            table
                .insert(vec![
                    ("timestamp", Value::Time(time)),
                    ("seq", Value::Int(seq)),
                    ("level", Value::text(level)),
                ])
                .unwrap();
        }
        if indexed {
            table.create_index("timestamp", IndexKind::Range).unwrap();
        }
    }
    db
}

/// Values of `column` over the records of a result.
pub fn column_values(columns: &[shardscan::sharding::ColumnSpec], records: &[Vec<Value>], column: &str) -> Vec<Value> {
    let position = columns
        .iter()
        .position(|c| c.name == column)
        .unwrap_or_else(|| panic!("no column {}", column));
    records.iter().map(|r| r[position].clone()).collect()
}

pub fn ints(values: Vec<Value>) -> Vec<i64> {
    values.into_iter().map(|v| v.as_int().unwrap()).collect()
}

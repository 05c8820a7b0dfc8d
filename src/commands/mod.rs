//! Logical command registry
//!
//! Maps command names to handlers taking textual parameters, the way a
//! command layer receives them, and renders every outcome as a
//! [`CommandOutput`]:
//!
//! ```json
//! {"status": "ok", "data": ...}
//! {"status": "error", "code": "SHARD_NO_SUCH_SHARD", "message": "..."}
//! ```
//!
//! The registry is built once per process.

mod params;

pub use params::{count_request, range_filter_request, select_request, Params};

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::sharding::{ShardedExecutor, ShardingError, ShardingResult};

pub type CommandHandler = fn(&ShardedExecutor<'_>, &Params) -> ShardingResult<Value>;

/// Outcome of one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutput {
    Ok { data: Value },
    Error { code: String, message: String },
}

impl CommandOutput {
    pub fn is_ok(&self) -> bool {
        matches!(self, CommandOutput::Ok { .. })
    }

    fn from_error(err: &ShardingError) -> Self {
        CommandOutput::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Registered handlers by command name.
pub fn registry() -> &'static HashMap<&'static str, CommandHandler> {
    static REGISTRY: OnceLock<HashMap<&'static str, CommandHandler>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut handlers: HashMap<&'static str, CommandHandler> = HashMap::new();
        handlers.insert("logical_count", run_logical_count);
        handlers.insert("logical_range_filter", run_logical_range_filter);
        handlers.insert("logical_select", run_logical_select);
        handlers
    })
}

/// Runs command `name`; failures become error outputs.
pub fn execute(executor: &ShardedExecutor<'_>, name: &str, params: &Params) -> CommandOutput {
    let result = match registry().get(name) {
        Some(handler) => handler(executor, params),
        None => Err(ShardingError::invalid_argument(format!(
            "unknown command: <{}>",
            name
        ))),
    };
    match result {
        Ok(data) => CommandOutput::Ok { data },
        Err(err) => {
            warn!(command = name, code = err.code(), error = %err, "COMMAND_FAILED");
            CommandOutput::from_error(&err)
        }
    }
}

fn run_logical_count(executor: &ShardedExecutor<'_>, params: &Params) -> ShardingResult<Value> {
    let count = executor.logical_count(&count_request(params)?)?;
    Ok(json!(count))
}

fn run_logical_range_filter(
    executor: &ShardedExecutor<'_>,
    params: &Params,
) -> ShardingResult<Value> {
    let result = executor.logical_range_filter(&range_filter_request(params)?)?;
    Ok(serde_json::to_value(result)?)
}

fn run_logical_select(executor: &ShardedExecutor<'_>, params: &Params) -> ShardingResult<Value> {
    let result = executor.logical_select(&select_request(params)?)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::memory::MemoryDatabase;
    use crate::storage::ColumnInfo;
    use crate::value::{parse_time, Value as Scalar, ValueType};

    fn database() -> MemoryDatabase {
        let mut db = MemoryDatabase::new();
        let table = db
            .create_table(
                "Logs_20240101",
                vec![
                    ColumnInfo::new("timestamp", ValueType::Time),
                    ColumnInfo::new("level", ValueType::Text),
                ],
            )
            .unwrap();
        for (time, level) in [("2024-01-01 01:00:00", "info"), ("2024-01-01 02:00:00", "warn")] {
            table
                .insert(vec![
                    ("timestamp", Scalar::Time(parse_time(time).unwrap())),
                    ("level", Scalar::text(level)),
                ])
                .unwrap();
        }
        db
    }

    fn base() -> Params {
        Params::new()
            .with("logical_table", "Logs")
            .with("shard_key", "timestamp")
    }

    #[test]
    fn test_registry_names() {
        let mut names: Vec<&str> = registry().keys().copied().collect();
        names.sort();
        assert_eq!(
            names,
            vec!["logical_count", "logical_range_filter", "logical_select"]
        );
    }

    #[test]
    fn test_count_output() {
        let db = database();
        let executor = ShardedExecutor::new(&db, Config::default());
        let output = execute(&executor, "logical_count", &base());
        assert_eq!(output, CommandOutput::Ok { data: json!(2) });
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({"status": "ok", "data": 2})
        );
    }

    #[test]
    fn test_range_filter_output() {
        let db = database();
        let executor = ShardedExecutor::new(&db, Config::default());
        let params = base()
            .with("order", "descending")
            .with("output_columns", "level");
        match execute(&executor, "logical_range_filter", &params) {
            CommandOutput::Ok { data } => {
                assert_eq!(data["records"], json!([["warn"], ["info"]]));
                assert_eq!(data["columns"][0]["name"], json!("level"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_errors_carry_codes() {
        let db = database();
        let executor = ShardedExecutor::new(&db, Config::default());

        let missing = execute(&executor, "logical_select", &Params::new().with("logical_table", "Logs"));
        assert!(matches!(
            missing,
            CommandOutput::Error { ref code, .. } if code == "SHARD_INVALID_ARGUMENT"
        ));

        let no_shard = execute(&executor, "logical_count", &base().with("logical_table", "Metrics"));
        assert!(matches!(
            no_shard,
            CommandOutput::Error { ref code, .. } if code == "SHARD_NO_SUCH_SHARD"
        ));

        let unknown = execute(&executor, "logical_shard_list", &base());
        assert!(!unknown.is_ok());
    }
}

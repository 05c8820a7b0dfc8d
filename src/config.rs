//! Query-layer configuration
//!
//! Loaded from a JSON file where every field is optional. Two settings can
//! also come from the environment, read once per process:
//!
//! - `SHARDSCAN_RANGE_INDEX_THRESHOLD`: ratio for the range-index strategy
//! - `SHARDSCAN_USE_RANGE_INDEX`: `yes|no|true|false` global override

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

pub const RANGE_INDEX_THRESHOLD_ENV: &str = "SHARDSCAN_RANGE_INDEX_THRESHOLD";
pub const USE_RANGE_INDEX_ENV: &str = "SHARDSCAN_USE_RANGE_INDEX";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Minimum estimated hit ratio for the range-index strategy
    #[serde(default = "default_range_index_threshold")]
    pub range_index_threshold: f64,

    /// Forces the range-index strategy on or off for every query
    #[serde(default)]
    pub use_range_index: Option<bool>,

    #[serde(default = "default_true")]
    pub merge_range_conditions: bool,

    #[serde(default = "default_true")]
    pub reorder_by_selectivity: bool,

    /// Run the tree-level optimizer before building scan conditions
    #[serde(default)]
    pub optimize_expressions: bool,

    /// Unmatched records an index scan may visit per requested record
    #[serde(default = "default_max_unmatched_ratio")]
    pub max_unmatched_ratio: u64,
}

fn default_range_index_threshold() -> f64 {
    0.2
}
fn default_true() -> bool {
    true
}
fn default_max_unmatched_ratio() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            range_index_threshold: default_range_index_threshold(),
            use_range_index: None,
            merge_range_conditions: true,
            reorder_by_selectivity: true,
            optimize_expressions: false,
            max_unmatched_ratio: default_max_unmatched_ratio(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.range_index_threshold.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "range_index_threshold must be finite, got {}",
                self.range_index_threshold
            )));
        }
        if self.max_unmatched_ratio == 0 {
            return Err(ConfigError::Invalid(
                "max_unmatched_ratio must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies the process environment on top of this configuration.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(env_overrides())
    }

    fn with_overrides(mut self, overrides: &EnvOverrides) -> Self {
        if let Some(threshold) = overrides.range_index_threshold {
            self.range_index_threshold = threshold;
        }
        if overrides.use_range_index.is_some() {
            self.use_range_index = overrides.use_range_index;
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct EnvOverrides {
    range_index_threshold: Option<f64>,
    use_range_index: Option<bool>,
}

static ENV_OVERRIDES: OnceLock<EnvOverrides> = OnceLock::new();

fn env_overrides() -> &'static EnvOverrides {
    ENV_OVERRIDES.get_or_init(|| EnvOverrides {
        range_index_threshold: read_env(RANGE_INDEX_THRESHOLD_ENV, parse_threshold),
        use_range_index: read_env(USE_RANGE_INDEX_ENV, parse_flag),
    })
}

fn read_env<T>(name: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(variable = name, value = %raw, "IGNORED_ENV_OVERRIDE");
    }
    parsed
}

fn parse_threshold(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|t| t.is_finite())
}

/// `yes|true` and `no|false`, case-insensitive.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" => Some(true),
        "no" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.range_index_threshold, 0.2);
        assert_eq!(config.max_unmatched_ratio, 100);
        assert!(config.merge_range_conditions);
        assert!(!config.optimize_expressions);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"range_index_threshold": 0.5, "use_range_index": false, "reorder_by_selectivity": false}}"#
        )
        .unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.range_index_threshold, 0.5);
        assert_eq!(config.use_range_index, Some(false));
        assert!(!config.reorder_by_selectivity);
        assert!(config.merge_range_conditions);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            Config::from_json(r#"{"max_unmatched_ratio": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_overrides_replace_only_set_fields() {
        let overrides = EnvOverrides {
            range_index_threshold: Some(0.7),
            use_range_index: None,
        };
        let config = Config {
            use_range_index: Some(true),
            ..Config::default()
        }
        .with_overrides(&overrides);
        assert_eq!(config.range_index_threshold, 0.7);
        assert_eq!(config.use_range_index, Some(true));
    }

    #[test]
    fn test_parse_env_values() {
        assert_eq!(parse_flag("YES"), Some(true));
        assert_eq!(parse_flag("false"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_threshold("0.25"), Some(0.25));
        assert_eq!(parse_threshold("NaN"), None);
        assert_eq!(parse_threshold("abc"), None);
    }
}

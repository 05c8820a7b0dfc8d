//! Column values
//!
//! `Value` is the scalar carried by columns, constants and index keys.
//!
//! Two orderings exist:
//! - `Ord` is a total order used for index keys and result sorting
//!   (null < bool < number < text < time < reference).
//! - [`compare`] is the semantic comparison used while evaluating filters.
//!   It coerces between integers and floats and reports incomparable pairs
//!   as `None`.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Record identifier inside one table.
pub type RecordId = u32;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Text,
    Time,
    /// Reference to a record of another table
    Ref,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Bool => "Bool",
            ValueType::Int => "Int64",
            ValueType::Float => "Float",
            ValueType::Text => "ShortText",
            ValueType::Time => "Time",
            ValueType::Ref => "Reference",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Time(NaiveDateTime),
    Ref(RecordId),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Truthiness used by logical operators.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Time(_) | Value::Ref(_) => true,
        }
    }

    /// Type of the value, `None` for null.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int(_) => Some(ValueType::Int),
            Value::Float(_) => Some(ValueType::Float),
            Value::Text(_) => Some(ValueType::Text),
            Value::Time(_) => Some(ValueType::Time),
            Value::Ref(_) => Some(ValueType::Ref),
        }
    }

    /// Converts the value into `target` when a lossless conversion exists.
    pub fn cast_to(&self, target: ValueType) -> Option<Value> {
        if self.value_type() == Some(target) {
            return Some(self.clone());
        }
        match (self, target) {
            (Value::Int(i), ValueType::Float) => Some(Value::Float(*i as f64)),
            (Value::Float(f), ValueType::Int) if f.fract() == 0.0 => Some(Value::Int(*f as i64)),
            (Value::Int(i), ValueType::Time) => {
                DateTime::from_timestamp(*i, 0).map(|t| Value::Time(t.naive_utc()))
            }
            (Value::Text(s), ValueType::Time) => parse_time(s).map(Value::Time),
            (Value::Int(i), ValueType::Ref) => u32::try_from(*i).ok().map(Value::Ref),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Text(_) => 3,
            Value::Time(_) => 4,
            Value::Ref(_) => 5,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            // Equal magnitudes keep integers first so the order stays total
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            (Value::Ref(a), Value::Ref(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Ref(id) => write!(f, "#{}", id),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Time(v)
    }
}

/// Semantic comparison used by filter evaluation.
///
/// Returns `None` when either side is null or the types cannot be compared.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Text(s)) => parse_time(s).map(|y| x.cmp(&y)),
        (Value::Text(s), Value::Time(y)) => parse_time(s).map(|x| x.cmp(y)),
        (Value::Ref(x), Value::Ref(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

const TIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d"];

/// Parses a time literal.
///
/// Accepts date-times with `/` or `-` separators, ISO `T` form, bare dates
/// and integral epoch seconds.
pub fn parse_time(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    for format in TIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, format) {
            return Some(t);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.naive_utc())
}

/// Splits text into lower-cased alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Hello, Groonga-world!"), vec!["hello", "groonga", "world"]);
        assert!(tokenize("  ,, ").is_empty());
    }

    fn t(s: &str) -> NaiveDateTime {
        parse_time(s).unwrap()
    }

    #[test]
    fn test_total_order_ranks_types() {
        let mut values = vec![
            Value::text("b"),
            Value::Int(3),
            Value::Null,
            Value::Float(1.5),
            Value::Bool(true),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Float(1.5),
                Value::Int(3),
                Value::text("b"),
            ]
        );
    }

    #[test]
    fn test_int_and_float_stay_distinct_keys() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert!(Value::Int(1) < Value::Float(1.0));
        assert_eq!(compare(&Value::Int(1), &Value::Float(1.0)), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_null_is_incomparable() {
        assert_eq!(compare(&Value::Null, &Value::Int(1)), None);
        assert_eq!(compare(&Value::text("a"), &Value::Int(1)), None);
    }

    #[test]
    fn test_compare_time_with_text_literal() {
        let time = Value::Time(t("2024/01/02 00:00:00"));
        assert_eq!(
            compare(&time, &Value::text("2024-01-01")),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_parse_time_formats() {
        let expected = NaiveDate::from_ymd_opt(2015, 2, 3)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();
        assert_eq!(parse_time("2015/02/03 04:05:06"), Some(expected));
        assert_eq!(parse_time("2015-02-03 04:05:06"), Some(expected));
        assert_eq!(parse_time("2015-02-03T04:05:06"), Some(expected));
        assert_eq!(
            parse_time("2015/02/03"),
            NaiveDate::from_ymd_opt(2015, 2, 3).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_time("0"), DateTime::from_timestamp(0, 0).map(|t| t.naive_utc()));
        assert_eq!(parse_time("yesterday"), None);
    }

    #[test]
    fn test_cast_to_column_types() {
        assert_eq!(Value::Int(2).cast_to(ValueType::Float), Some(Value::Float(2.0)));
        assert_eq!(Value::Float(2.5).cast_to(ValueType::Int), None);
        assert_eq!(
            Value::text("2024-03-01").cast_to(ValueType::Time),
            Some(Value::Time(t("2024-03-01")))
        );
        assert_eq!(Value::text("x").cast_to(ValueType::Int), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::text("x").is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }
}

//! Shard time ranges and their overlap with a query range

use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::storage::Border;

/// Time range a query targets. Either bound may be open.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: Option<NaiveDateTime>,
    #[serde(default)]
    pub min_border: Border,
    pub max: Option<NaiveDateTime>,
    #[serde(default)]
    pub max_border: Border,
}

impl TargetRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_min(mut self, min: NaiveDateTime, border: Border) -> Self {
        self.min = Some(min);
        self.min_border = border;
        self
    }

    pub fn with_max(mut self, max: NaiveDateTime, border: Border) -> Self {
        self.max = Some(max);
        self.max_border = border;
        self
    }

    /// True when no instant satisfies both bounds.
    pub fn is_empty(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => {
                min > max
                    || (min == max
                        && (self.min_border == Border::Exclude
                            || self.max_border == Border::Exclude))
            }
            _ => false,
        }
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        let above = match (self.min, self.min_border) {
            (None, _) => true,
            (Some(min), Border::Include) => time >= min,
            (Some(min), Border::Exclude) => time > min,
        };
        let below = match (self.max, self.max_border) {
            (None, _) => true,
            (Some(max), Border::Include) => time <= max,
            (Some(max), Border::Exclude) => time < max,
        };
        above && below
    }
}

/// How much of a shard the target range covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverType {
    None,
    All,
    /// The target's lower bound falls inside the shard
    PartialMin,
    /// The target's upper bound falls inside the shard
    PartialMax,
    PartialMinAndMax,
}

impl CoverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverType::None => "none",
            CoverType::All => "all",
            CoverType::PartialMin => "partial_min",
            CoverType::PartialMax => "partial_max",
            CoverType::PartialMinAndMax => "partial_min_and_max",
        }
    }
}

impl fmt::Display for CoverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open interval `[min_time, least_over_time)` of one shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShardRange {
    pub year: i32,
    pub month: u32,
    /// Set for day shards
    pub day: Option<u32>,
    /// Exclusive end day of a month shard followed by a day shard of the
    /// same month
    pub max_day: Option<u32>,
    min_time: NaiveDateTime,
    least_over_time: NaiveDateTime,
}

impl ShardRange {
    /// `None` for dates that do not exist.
    pub fn new(year: i32, month: u32, day: Option<u32>) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, day.unwrap_or(1))?;
        let end = match day {
            Some(_) => start.checked_add_signed(Duration::days(1))?,
            None => first_of_next_month(year, month)?,
        };
        Some(Self {
            year,
            month,
            day,
            max_day: None,
            min_time: start.and_hms_opt(0, 0, 0)?,
            least_over_time: end.and_hms_opt(0, 0, 0)?,
        })
    }

    /// Ends a month shard at the start of `max_day`.
    ///
    /// Day shards and days outside `(1, end of month]` leave the range
    /// unchanged.
    pub fn with_max_day(mut self, max_day: u32) -> Self {
        if self.day.is_some() || max_day <= 1 {
            return self;
        }
        if let Some(end) = NaiveDate::from_ymd_opt(self.year, self.month, max_day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            self.max_day = Some(max_day);
            self.least_over_time = end;
        }
        self
    }

    /// Inclusive lower bound.
    pub fn min_time(&self) -> NaiveDateTime {
        self.min_time
    }

    /// Exclusive upper bound.
    pub fn least_over_time(&self) -> NaiveDateTime {
        self.least_over_time
    }

    pub fn is_day(&self) -> bool {
        self.day.is_some()
    }

    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.min_time <= time && time < self.least_over_time
    }

    pub fn cover_type(&self, target: &TargetRange) -> CoverType {
        if target.is_empty() || !self.intersects(target) {
            return CoverType::None;
        }
        let min_partial = match target.min {
            Some(min) => match target.min_border {
                Border::Include => min > self.min_time,
                Border::Exclude => min >= self.min_time,
            },
            None => false,
        };
        let max_partial = target.max.is_some_and(|max| max < self.least_over_time);
        match (min_partial, max_partial) {
            (true, true) => CoverType::PartialMinAndMax,
            (true, false) => CoverType::PartialMin,
            (false, true) => CoverType::PartialMax,
            (false, false) => CoverType::All,
        }
    }

    fn intersects(&self, target: &TargetRange) -> bool {
        if let Some(min) = target.min {
            if min >= self.least_over_time {
                return false;
            }
        }
        match (target.max, target.max_border) {
            (Some(max), Border::Include) => max >= self.min_time,
            (Some(max), Border::Exclude) => max > self.min_time,
            (None, _) => true,
        }
    }
}

fn first_of_next_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
}

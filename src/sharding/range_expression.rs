//! Boundary filters for partially covered shards

use super::range::{CoverType, TargetRange};
use crate::expr::{Expression, Operator, BETWEEN_PROCEDURE};
use crate::storage::Border;
use crate::value::Value;

/// Builds the filter restricting a shard to the covered part of its range,
/// combined with the caller's filter.
pub struct RangeExpressionBuilder<'a> {
    shard_key: &'a str,
    target: &'a TargetRange,
    filter: Option<&'a Expression>,
}

impl<'a> RangeExpressionBuilder<'a> {
    pub fn new(shard_key: &'a str, target: &'a TargetRange) -> Self {
        Self {
            shard_key,
            target,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<&'a Expression>) -> Self {
        self.filter = filter;
        self
    }

    /// Filter for a shard with cover `cover`; `None` when every record of
    /// the shard matches.
    pub fn build(&self, cover: CoverType) -> Option<Expression> {
        let boundary = match cover {
            CoverType::None | CoverType::All => None,
            CoverType::PartialMin => self.build_partial_min(),
            CoverType::PartialMax => self.build_partial_max(),
            CoverType::PartialMinAndMax => self.build_partial_min_and_max(),
        };
        match (boundary, self.filter) {
            (Some(boundary), Some(filter)) => Some(boundary.and_then(filter, Operator::And)),
            (Some(boundary), None) => Some(boundary),
            (None, Some(filter)) => Some(filter.clone()),
            (None, None) => None,
        }
    }

    /// `shard_key >= min` or `shard_key > min`.
    pub fn build_partial_min(&self) -> Option<Expression> {
        let min = self.target.min?;
        let op = match self.target.min_border {
            Border::Include => Operator::GreaterEqual,
            Border::Exclude => Operator::Greater,
        };
        Some(
            Expression::new()
                .column(self.shard_key)
                .constant(Value::Time(min))
                .operator(op),
        )
    }

    /// `shard_key <= max` or `shard_key < max`.
    pub fn build_partial_max(&self) -> Option<Expression> {
        let max = self.target.max?;
        let op = match self.target.max_border {
            Border::Include => Operator::LessEqual,
            Border::Exclude => Operator::Less,
        };
        Some(
            Expression::new()
                .column(self.shard_key)
                .constant(Value::Time(max))
                .operator(op),
        )
    }

    /// `between(shard_key, min, min_border, max, max_border)`
    pub fn build_partial_min_and_max(&self) -> Option<Expression> {
        let min = self.target.min?;
        let max = self.target.max?;
        Some(
            Expression::new()
                .procedure(BETWEEN_PROCEDURE)
                .column(self.shard_key)
                .constant(Value::Time(min))
                .constant(self.target.min_border.as_str())
                .constant(Value::Time(max))
                .constant(self.target.max_border.as_str())
                .call(5),
        )
    }
}

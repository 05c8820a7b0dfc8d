//! Scored record sets

use std::collections::BTreeMap;

use crate::expr::Operator;
use crate::value::RecordId;

/// Set of matching records with an accumulated relevance score each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: BTreeMap<RecordId, i32>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding `ids`, each scored `score`.
    pub fn from_ids(ids: impl IntoIterator<Item = RecordId>, score: i32) -> Self {
        Self {
            records: ids.into_iter().map(|id| (id, score)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn score(&self, id: RecordId) -> Option<i32> {
        self.records.get(&id).copied()
    }

    /// Adds `id`, accumulating into an existing score.
    pub fn add(&mut self, id: RecordId, score: i32) {
        *self.records.entry(id).or_insert(0) += score;
    }

    pub fn remove(&mut self, id: RecordId) {
        self.records.remove(&id);
    }

    /// Record ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, i32)> + '_ {
        self.records.iter().map(|(id, score)| (*id, *score))
    }

    pub fn retain(&mut self, mut keep: impl FnMut(RecordId) -> bool) {
        self.records.retain(|id, _| keep(*id));
    }

    /// Combines `other` into `self` with a logical operator.
    ///
    /// - `Or`: union, scores add
    /// - `And`: intersection, scores add
    /// - `AndNot`: difference
    /// - `Adjust`: membership unchanged, shared records gain `other`'s score
    pub fn combine(mut self, other: RecordSet, op: Operator) -> RecordSet {
        match op {
            Operator::Or => {
                for (id, score) in other.records {
                    self.add(id, score);
                }
            }
            Operator::And => {
                self.records.retain(|id, score| match other.records.get(id) {
                    Some(s) => {
                        *score += s;
                        true
                    }
                    None => false,
                });
            }
            Operator::AndNot => {
                self.records.retain(|id, _| !other.records.contains_key(id));
            }
            Operator::Adjust => {
                for (id, score) in other.records {
                    if let Some(existing) = self.records.get_mut(&id) {
                        *existing += score;
                    }
                }
            }
            _ => {}
        }
        self
    }
}

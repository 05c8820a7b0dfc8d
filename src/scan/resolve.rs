//! Index resolution through reference chains
//!
//! For `author.name == "alice"` the usable index lives on `Users.name`.
//! Its hits are `Users` ids, which are mapped back to `Posts` ids through
//! an equality index on the reference column `Posts.author`. Every hop
//! needs such an index, otherwise the chain is not index-resolvable.

use std::collections::BTreeSet;

use crate::expr::Operator;
use crate::storage::{Database, Index, Table};
use crate::value::{RecordId, Value, ValueType};

pub struct ResolvedIndex<'a> {
    pub index: &'a dyn Index,
    /// Table owning the indexed column
    pub target: &'a dyn Table,
    /// Reference-column indexes, outermost first
    hops: Vec<&'a dyn Index>,
}

impl<'a> ResolvedIndex<'a> {
    /// Declared type of the indexed column.
    pub fn key_type(&self) -> Option<ValueType> {
        self.target
            .column(self.index.column())
            .map(|c| c.value_type)
    }

    /// Maps ids of the target table back to ids of the scanned table.
    pub fn map_back(&self, ids: Vec<RecordId>) -> Vec<RecordId> {
        let mut ids = ids;
        for hop in self.hops.iter().rev() {
            let mapped: BTreeSet<RecordId> = ids
                .iter()
                .flat_map(|id| hop.lookup(&Value::Ref(*id)))
                .collect();
            ids = mapped.into_iter().collect();
        }
        ids
    }

    pub fn is_direct(&self) -> bool {
        self.hops.is_empty()
    }
}

/// Finds an index answering `op` on the column at the end of `path`.
pub fn resolve_index<'a>(
    db: &'a dyn Database,
    table: &'a dyn Table,
    path: &[String],
    op: Operator,
) -> Option<ResolvedIndex<'a>> {
    let (last, hops) = path.split_last()?;
    let mut current = table;
    let mut hop_indexes = Vec::with_capacity(hops.len());
    for column in hops {
        let target = current.column(column)?.reference.as_deref()?;
        hop_indexes.push(current.index(column, Operator::Equal)?);
        current = db.table(target)?;
    }
    let index = current.index(last, op)?;
    Some(ResolvedIndex {
        index,
        target: current,
        hops: hop_indexes,
    })
}

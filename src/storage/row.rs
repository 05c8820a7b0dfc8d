//! Row views used by expression evaluation

use std::collections::BTreeMap;

use serde::Serialize;

use super::{Database, Table, ID_COLUMN};
use crate::value::{RecordId, Value};

/// Read access to the columns of one row.
pub trait RowAccess {
    fn value(&self, column: &str) -> Option<Value>;

    /// Follows reference columns along `path`.
    fn value_path(&self, path: &[String]) -> Option<Value> {
        match path {
            [column] => self.value(column),
            _ => None,
        }
    }
}

/// A record of a stored table.
pub struct TableRow<'a> {
    db: Option<&'a dyn Database>,
    table: &'a dyn Table,
    id: RecordId,
}

impl<'a> TableRow<'a> {
    pub fn new(table: &'a dyn Table, id: RecordId) -> Self {
        Self {
            db: None,
            table,
            id,
        }
    }

    /// Row able to resolve accessor chains through `db`.
    pub fn with_database(db: &'a dyn Database, table: &'a dyn Table, id: RecordId) -> Self {
        Self {
            db: Some(db),
            table,
            id,
        }
    }
}

impl RowAccess for TableRow<'_> {
    fn value(&self, column: &str) -> Option<Value> {
        self.table.value(self.id, column)
    }

    fn value_path(&self, path: &[String]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.table.value(self.id, first)?;
        let mut table = self.table;
        let mut column = first.as_str();

        for next in rest {
            let target = table.column(column)?.reference.as_deref()?;
            let target = self.db?.table(target)?;
            match value {
                Value::Ref(id) => {
                    value = target.value(id, next)?;
                }
                _ => return Some(Value::Null),
            }
            table = target;
            column = next.as_str();
        }
        Some(value)
    }
}

/// A materialized row of a logical result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub shard: String,
    pub id: RecordId,
    pub values: BTreeMap<String, Value>,
}

impl ResultRow {
    pub fn new(shard: impl Into<String>, id: RecordId) -> Self {
        Self {
            shard: shard.into(),
            id,
            values: BTreeMap::new(),
        }
    }

    /// Copies every column of `id` from `table`.
    pub fn from_table(table: &dyn Table, id: RecordId) -> Self {
        let mut row = Self::new(table.name(), id);
        for column in table.columns() {
            if let Some(value) = table.value(id, &column.name) {
                row.values.insert(column.name.clone(), value);
            }
        }
        if table.is_keyed() {
            if let Some(key) = table.value(id, super::KEY_COLUMN) {
                row.values.insert(super::KEY_COLUMN.to_string(), key);
            }
        }
        row
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    /// Values of `columns` in order, null for missing ones.
    pub fn project(&self, columns: &[String]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| self.value(c).unwrap_or(Value::Null))
            .collect()
    }
}

impl RowAccess for ResultRow {
    fn value(&self, column: &str) -> Option<Value> {
        if column == ID_COLUMN {
            return Some(Value::Int(i64::from(self.id)));
        }
        self.values.get(column).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryDatabase;
    use crate::storage::ColumnInfo;
    use crate::value::ValueType;

    #[test]
    fn test_accessor_follows_reference() {
        let mut db = MemoryDatabase::new();
        let users = db
            .create_table("Users", vec![ColumnInfo::new("name", ValueType::Text)])
            .unwrap();
        let alice = users.insert(vec![("name", Value::text("alice"))]).unwrap();
        let posts = db
            .create_table("Posts", vec![ColumnInfo::reference("author", "Users")])
            .unwrap();
        let post = posts.insert(vec![("author", Value::Ref(alice))]).unwrap();

        let posts = db.table("Posts").unwrap();
        let row = TableRow::with_database(&db, posts, post);
        let path = vec!["author".to_string(), "name".to_string()];
        assert_eq!(row.value_path(&path), Some(Value::text("alice")));

        // Without a database the chain cannot be followed
        let row = TableRow::new(posts, post);
        assert_eq!(row.value_path(&path), None);
    }

    #[test]
    fn test_result_row_projection() {
        let mut row = ResultRow::new("Logs_20240101", 3);
        row.set("level", Value::text("warn"));
        let columns = vec!["_id".to_string(), "level".to_string(), "missing".to_string()];
        assert_eq!(
            row.project(&columns),
            vec![Value::Int(3), Value::text("warn"), Value::Null]
        );
    }
}

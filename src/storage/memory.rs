//! In-memory storage
//!
//! Tables keep rows in a `BTreeMap` keyed by record id. Indexes keep an
//! ordered lexicon mapping each term to its ascending posting list, so
//! range scans, prefix scans and lexicon sampling are plain `BTreeMap`
//! range walks.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use super::{
    ColumnInfo, Database, Index, IndexKind, KeyRange, Order, StorageError, StorageResult, Table,
    ID_COLUMN, KEY_COLUMN,
};
use crate::expr::Operator;
use crate::value::{tokenize, RecordId, Value, ValueType};

// =============================================================================
// Index
// =============================================================================

#[derive(Debug, Clone)]
pub struct MemoryIndex {
    name: String,
    column: String,
    kind: IndexKind,
    postings: BTreeMap<Value, Vec<RecordId>>,
}

impl MemoryIndex {
    pub fn new(table: &str, column: &str, kind: IndexKind) -> Self {
        Self {
            name: format!("{}.{}", table, column),
            column: column.to_string(),
            kind,
            postings: BTreeMap::new(),
        }
    }

    fn terms_of(&self, value: &Value) -> Vec<Value> {
        match (self.kind, value) {
            (_, Value::Null) => Vec::new(),
            (IndexKind::FullText, Value::Text(text)) => {
                let unique: BTreeSet<String> = tokenize(text).into_iter().collect();
                unique.into_iter().map(Value::Text).collect()
            }
            (IndexKind::FullText, _) => Vec::new(),
            (IndexKind::Range, v) => vec![v.clone()],
        }
    }

    /// Adds a record. Ids must be added in ascending order.
    pub fn add(&mut self, id: RecordId, value: &Value) {
        for term in self.terms_of(value) {
            self.postings.entry(term).or_default().push(id);
        }
    }

    fn keys<'a>(&'a self, range: &KeyRange) -> Box<dyn Iterator<Item = &'a Value> + 'a> {
        if range.is_empty() {
            return Box::new(std::iter::empty());
        }
        if let Some(prefix) = &range.prefix {
            let start = Value::text(prefix.clone());
            let prefix = prefix.clone();
            let iter = self
                .postings
                .range((Bound::Included(start), Bound::Unbounded))
                .map(|(k, _)| k)
                .take_while(move |k| k.as_text().is_some_and(|t| t.starts_with(prefix.as_str())));
            return match range.order {
                Order::Ascending => Box::new(iter),
                Order::Descending => Box::new(iter.collect::<Vec<_>>().into_iter().rev()),
            };
        }
        let iter = self
            .postings
            .range::<Value, _>((range.lower_bound(), range.upper_bound()))
            .map(|(k, _)| k);
        match range.order {
            Order::Ascending => Box::new(iter),
            Order::Descending => Box::new(iter.rev()),
        }
    }

    fn query_postings(&self, query: &str) -> Vec<&Vec<RecordId>> {
        tokenize(query)
            .into_iter()
            .filter_map(|t| self.postings.get(&Value::Text(t)))
            .collect()
    }
}

impl Index for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn column(&self) -> &str {
        &self.column
    }

    fn kind(&self) -> IndexKind {
        self.kind
    }

    fn supports(&self, op: Operator) -> bool {
        match self.kind {
            IndexKind::Range => matches!(
                op,
                Operator::Equal
                    | Operator::Less
                    | Operator::Greater
                    | Operator::LessEqual
                    | Operator::GreaterEqual
                    | Operator::Prefix
                    | Operator::Call
            ),
            IndexKind::FullText => matches!(
                op,
                Operator::Match | Operator::Near | Operator::Similar | Operator::Regexp
            ),
        }
    }

    fn lexicon_size(&self) -> usize {
        self.postings.len()
    }

    fn term_size(&self, term: &Value) -> Option<usize> {
        self.postings.get(term).map(Vec::len)
    }

    fn estimate_query(&self, op: Operator, query: &str) -> usize {
        let n_tokens = tokenize(query).len();
        let postings = self.query_postings(query);
        match op {
            Operator::Similar => postings.iter().map(|p| p.len()).sum(),
            _ if postings.len() < n_tokens || postings.is_empty() => 0,
            _ => postings.iter().map(|p| p.len()).min().unwrap_or(0),
        }
    }

    fn lexicon_cursor(&self, range: &KeyRange, limit: Option<usize>) -> Vec<Value> {
        let keys = self.keys(range).cloned();
        match limit {
            Some(limit) => keys.take(limit).collect(),
            None => keys.collect(),
        }
    }

    fn lookup(&self, term: &Value) -> Vec<RecordId> {
        self.postings.get(term).cloned().unwrap_or_default()
    }

    fn cursor<'a>(&'a self, range: &KeyRange) -> Box<dyn Iterator<Item = RecordId> + 'a> {
        let keys: Vec<&'a Value> = self.keys(range).collect();
        Box::new(
            keys.into_iter()
                .filter_map(move |k| self.postings.get(k))
                .flat_map(|ids| ids.iter().copied()),
        )
    }

    fn search(&self, op: Operator, query: &Value) -> Option<Vec<RecordId>> {
        match (self.kind, op) {
            (IndexKind::Range, Operator::Equal) => Some(self.lookup(query)),
            (IndexKind::Range, Operator::Prefix) => {
                let prefix = query.as_text()?;
                let ids: BTreeSet<RecordId> = self.cursor(&KeyRange::prefix(prefix)).collect();
                Some(ids.into_iter().collect())
            }
            (IndexKind::FullText, Operator::Match) => {
                let query = query.as_text()?;
                let n_tokens = tokenize(query).len();
                let postings = self.query_postings(query);
                if n_tokens == 0 || postings.len() < n_tokens {
                    return Some(Vec::new());
                }
                let mut result: BTreeSet<RecordId> = postings[0].iter().copied().collect();
                for p in &postings[1..] {
                    let next: BTreeSet<RecordId> = p.iter().copied().collect();
                    result = result.intersection(&next).copied().collect();
                }
                Some(result.into_iter().collect())
            }
            _ => None,
        }
    }
}

// =============================================================================
// Table
// =============================================================================

#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<ColumnInfo>,
    rows: BTreeMap<RecordId, Vec<Value>>,
    keys: Option<BTreeMap<Value, RecordId>>,
    next_id: RecordId,
    indexes: Vec<MemoryIndex>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: BTreeMap::new(),
            keys: None,
            next_id: 1,
            indexes: Vec::new(),
        }
    }

    /// Table whose records carry a unique ordered key.
    pub fn keyed(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            keys: Some(BTreeMap::new()),
            ..Self::new(name, columns)
        }
    }

    pub fn insert(&mut self, values: Vec<(&str, Value)>) -> StorageResult<RecordId> {
        if self.keys.is_some() {
            return Err(StorageError::InvalidKey {
                table: self.name.clone(),
                reason: "keyed table requires a key".to_string(),
            });
        }
        self.insert_row(values)
    }

    pub fn insert_with_key(&mut self, key: Value, values: Vec<(&str, Value)>) -> StorageResult<RecordId> {
        let name = self.name.clone();
        let keys = self.keys.as_ref().ok_or_else(|| StorageError::InvalidKey {
            table: name.clone(),
            reason: "table has no key".to_string(),
        })?;
        if key.is_null() || keys.contains_key(&key) {
            return Err(StorageError::InvalidKey {
                table: name,
                reason: format!("duplicate or null key: {}", key),
            });
        }
        let id = self.insert_row(values)?;
        if let Some(keys) = self.keys.as_mut() {
            keys.insert(key, id);
        }
        Ok(id)
    }

    fn insert_row(&mut self, values: Vec<(&str, Value)>) -> StorageResult<RecordId> {
        let mut row = vec![Value::Null; self.columns.len()];
        for (column, value) in values {
            let position = self.position(column)?;
            let info = &self.columns[position];
            row[position] = if value.is_null() {
                value
            } else {
                value
                    .cast_to(info.value_type)
                    .ok_or_else(|| StorageError::TypeMismatch {
                        column: info.name.clone(),
                        expected: info.value_type,
                    })?
            };
        }

        let id = self.next_id;
        self.next_id += 1;
        for index in &mut self.indexes {
            if let Some(position) = self.columns.iter().position(|c| c.name == index.column) {
                index.add(id, &row[position]);
            }
        }
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Builds an index over the existing rows and maintains it on insert.
    pub fn create_index(&mut self, column: &str, kind: IndexKind) -> StorageResult<()> {
        let position = self.position(column)?;
        if self
            .indexes
            .iter()
            .any(|i| i.column == column && i.kind == kind)
        {
            return Err(StorageError::DuplicateIndex {
                table: self.name.clone(),
                column: column.to_string(),
            });
        }
        if kind == IndexKind::FullText && self.columns[position].value_type != ValueType::Text {
            return Err(StorageError::TypeMismatch {
                column: column.to_string(),
                expected: ValueType::Text,
            });
        }
        let mut index = MemoryIndex::new(&self.name, column, kind);
        for (id, row) in &self.rows {
            index.add(*id, &row[position]);
        }
        self.indexes.push(index);
        Ok(())
    }

    fn position(&self, column: &str) -> StorageResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| StorageError::NoSuchColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    fn key_of(&self, id: RecordId) -> Option<Value> {
        self.keys
            .as_ref()?
            .iter()
            .find(|(_, record)| **record == id)
            .map(|(key, _)| key.clone())
    }
}

impl Table for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> usize {
        self.rows.len()
    }

    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn record_ids(&self) -> Box<dyn Iterator<Item = RecordId> + '_> {
        Box::new(self.rows.keys().copied())
    }

    fn contains(&self, id: RecordId) -> bool {
        self.rows.contains_key(&id)
    }

    fn value(&self, id: RecordId, column: &str) -> Option<Value> {
        let row = self.rows.get(&id)?;
        match column {
            ID_COLUMN => Some(Value::Int(i64::from(id))),
            KEY_COLUMN if self.keys.is_some() => self.key_of(id),
            _ => {
                let position = self.columns.iter().position(|c| c.name == column)?;
                row.get(position).cloned()
            }
        }
    }

    fn index(&self, column: &str, op: Operator) -> Option<&dyn Index> {
        self.indexes
            .iter()
            .find(|i| i.column == column && i.supports(op))
            .map(|i| i as &dyn Index)
    }

    fn is_keyed(&self) -> bool {
        self.keys.is_some()
    }

    fn key_cursor<'a>(&'a self, range: &KeyRange) -> Option<Box<dyn Iterator<Item = RecordId> + 'a>> {
        let keys = self.keys.as_ref()?;
        if range.is_empty() {
            return Some(Box::new(std::iter::empty()));
        }
        let range = range.clone();
        let iter = keys.iter().filter(move |(k, _)| range.contains(k)).map(|(_, id)| *id);
        Some(Box::new(iter))
    }
}

// =============================================================================
// Database
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: BTreeMap<String, MemoryTable>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnInfo>) -> StorageResult<&mut MemoryTable> {
        self.add_table(MemoryTable::new(name, columns))
    }

    pub fn create_keyed_table(&mut self, name: &str, columns: Vec<ColumnInfo>) -> StorageResult<&mut MemoryTable> {
        self.add_table(MemoryTable::keyed(name, columns))
    }

    fn add_table(&mut self, table: MemoryTable) -> StorageResult<&mut MemoryTable> {
        let name = table.name.clone();
        if self.tables.contains_key(&name) {
            return Err(StorageError::DuplicateTable(name));
        }
        Ok(self.tables.entry(name).or_insert(table))
    }

    pub fn table_mut(&mut self, name: &str) -> StorageResult<&mut MemoryTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::NoSuchTable(name.to_string()))
    }

    pub fn drop_table(&mut self, name: &str) -> bool {
        self.tables.remove(name).is_some()
    }
}

impl Database for MemoryDatabase {
    fn table_names(&self, prefix: &str, order: Order) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(name, _)| name)
            .take_while(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        if order == Order::Descending {
            names.reverse();
        }
        names
    }

    fn table(&self, name: &str) -> Option<&dyn Table> {
        self.tables.get(name).map(|t| t as &dyn Table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Border;

    fn scores_table() -> MemoryTable {
        let mut table = MemoryTable::new(
            "Scores",
            vec![
                ColumnInfo::new("score", ValueType::Int),
                ColumnInfo::new("body", ValueType::Text),
            ],
        );
        for (score, body) in [(5, "red fox"), (3, "blue fox"), (5, "red hen"), (8, "grey wolf")] {
            table
                .insert(vec![("score", Value::Int(score)), ("body", Value::text(body))])
                .unwrap();
        }
        table.create_index("score", IndexKind::Range).unwrap();
        table.create_index("body", IndexKind::FullText).unwrap();
        table
    }

    #[test]
    fn test_insert_assigns_ascending_ids() {
        let table = scores_table();
        let ids: Vec<RecordId> = table.record_ids().collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(table.value(2, "score"), Some(Value::Int(3)));
        assert_eq!(table.value(2, "_id"), Some(Value::Int(2)));
        assert_eq!(table.value(9, "score"), None);
    }

    #[test]
    fn test_insert_rejects_unknown_column_and_bad_type() {
        let mut table = scores_table();
        assert!(matches!(
            table.insert(vec![("nope", Value::Int(1))]),
            Err(StorageError::NoSuchColumn { .. })
        ));
        assert!(matches!(
            table.insert(vec![("score", Value::text("high"))]),
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_range_cursor_orders_ties_by_id() {
        let table = scores_table();
        let index = table.index("score", Operator::Less).unwrap();
        let range = KeyRange::all().with_min(Value::Int(4), Border::Include);
        let ids: Vec<RecordId> = index.cursor(&range).collect();
        assert_eq!(ids, vec![1, 3, 4]);

        let descending: Vec<RecordId> = index.cursor(&range.with_order(Order::Descending)).collect();
        assert_eq!(descending, vec![4, 1, 3]);
    }

    #[test]
    fn test_empty_range_does_not_panic() {
        let table = scores_table();
        let index = table.index("score", Operator::Less).unwrap();
        let range = KeyRange::all()
            .with_min(Value::Int(5), Border::Exclude)
            .with_max(Value::Int(5), Border::Exclude);
        assert_eq!(index.cursor(&range).count(), 0);
        assert!(index.lexicon_cursor(&range, None).is_empty());
    }

    #[test]
    fn test_lexicon_cursor_limit() {
        let table = scores_table();
        let index = table.index("score", Operator::Equal).unwrap();
        assert_eq!(index.lexicon_size(), 3);
        let terms = index.lexicon_cursor(&KeyRange::all(), Some(2));
        assert_eq!(terms, vec![Value::Int(3), Value::Int(5)]);
        assert_eq!(index.estimate_terms(&terms), 3);
    }

    #[test]
    fn test_full_text_match() {
        let table = scores_table();
        let index = table.index("body", Operator::Match).unwrap();
        assert_eq!(index.search(Operator::Match, &Value::text("fox")), Some(vec![1, 2]));
        assert_eq!(index.search(Operator::Match, &Value::text("RED fox")), Some(vec![1]));
        assert_eq!(index.search(Operator::Match, &Value::text("cat")), Some(vec![]));
        assert_eq!(index.estimate_query(Operator::Match, "red fox"), 2);
        assert_eq!(index.search(Operator::Near, &Value::text("red fox")), None);
        assert!(table.index("body", Operator::Less).is_none());
    }

    #[test]
    fn test_index_maintained_on_insert() {
        let mut table = scores_table();
        let id = table.insert(vec![("score", Value::Int(3))]).unwrap();
        let index = table.index("score", Operator::Equal).unwrap();
        assert_eq!(index.lookup(&Value::Int(3)), vec![2, id]);
    }

    #[test]
    fn test_keyed_table_cursor() {
        let mut table = MemoryTable::keyed("Tags", vec![]);
        for key in ["c", "a", "b"] {
            table.insert_with_key(Value::text(key), vec![]).unwrap();
        }
        assert!(table.insert(vec![]).is_err());
        assert!(table.insert_with_key(Value::text("a"), vec![]).is_err());
        let range = KeyRange::all().with_min(Value::text("b"), Border::Include);
        let ids: Vec<RecordId> = table.key_cursor(&range).unwrap().collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(table.value(1, "_key"), Some(Value::text("c")));
    }

    #[test]
    fn test_table_names_by_prefix() {
        let mut db = MemoryDatabase::new();
        for name in ["Logs_20240102", "Logs_20240101", "Other", "Logs_202312"] {
            db.create_table(name, vec![]).unwrap();
        }
        assert_eq!(
            db.table_names("Logs_", Order::Ascending),
            vec!["Logs_202312", "Logs_20240101", "Logs_20240102"]
        );
        assert_eq!(db.table_names("Logs_", Order::Descending)[0], "Logs_20240102");
        assert!(matches!(
            db.create_table("Other", vec![]),
            Err(StorageError::DuplicateTable(_))
        ));
    }
}

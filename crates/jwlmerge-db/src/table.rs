//! In-memory relation model.
//!
//! Tables are loaded from the source databases into plain row vectors with an
//! ordered column list, replacing SQLite's storage with something the merge
//! engine can rewrite freely. Nulls are normalized to empty strings on load
//! (and restored to nulls on write, see [`crate::writer`]), so mid-pipeline
//! code only ever deals with integers, reals, and text.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// A single cell value.
///
/// `Real` and `Blob` never participate in key columns; they are carried so
/// that unrecognized tables pass through the merge untouched.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// True for the normalized empty cell (empty text or a null).
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// The integer payload, if this is an integer cell.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The text payload, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Shift integer (and real) payloads by `offset`, leaving other variants
    /// untouched. Used when loading the second and subsequent sources.
    pub fn offset_by(&self, offset: i64) -> Value {
        match self {
            Value::Integer(i) => Value::Integer(i + offset),
            Value::Real(f) => Value::Real(f + offset as f64),
            other => other.clone(),
        }
    }

    /// Debug-dump representation.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(f) => serde_json::Value::from(*f),
            Value::Text(s) => serde_json::Value::from(s.clone()),
            Value::Blob(b) => serde_json::Value::from(format!("<blob {} bytes>", b.len())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) => 2,
            Value::Blob(_) => 3,
        }
    }

    /// Total ordering across variants: nulls, then numbers, then text, then
    /// blobs. Within numbers, integers and reals compare numerically.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Real(a), Value::Real(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Integer(a), Value::Real(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Value::Real(a), Value::Integer(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
            }
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Blob(a), Value::Blob(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Real(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Blob(b) => b.hash(state),
        }
    }
}

/// A named relation: ordered column names plus a row multiset.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table.
    pub fn new<S: Into<String>>(name: S, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Index of a column by name.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace null cells with empty strings across every row.
    pub fn normalize_nulls(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if matches!(cell, Value::Null) {
                    *cell = Value::Text(String::new());
                }
            }
        }
    }

    /// Rewrite integer values of one column through a replacement map.
    /// Values absent from the map pass through unchanged.
    pub fn remap_integer_column(&mut self, column: usize, map: &HashMap<i64, i64>) {
        for row in &mut self.rows {
            if let Value::Integer(v) = row[column] {
                if let Some(&replacement) = map.get(&v) {
                    row[column] = Value::Integer(replacement);
                }
            }
        }
    }

    /// Drop rows that are exact duplicates of an earlier row.
    pub fn dedup_exact(&mut self) {
        let mut seen = HashSet::new();
        self.rows.retain(|row| seen.insert(row.clone()));
    }

    /// Drop rows that duplicate an earlier row in every column except the
    /// ignored one.
    pub fn dedup_ignoring(&mut self, ignored: usize) {
        let mut seen = HashSet::new();
        self.rows.retain(|row| {
            let key: Vec<Value> = row
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != ignored)
                .map(|(_, v)| v.clone())
                .collect();
            seen.insert(key)
        });
    }

    /// Stable-sort rows by one column, descending.
    pub fn sort_by_column_desc(&mut self, column: usize) {
        self.rows
            .sort_by(|a, b| b[column].compare(&a[column]));
    }

    /// All integer values present in a column.
    pub fn integer_values(&self, column: usize) -> HashSet<i64> {
        self.rows
            .iter()
            .filter_map(|row| row[column].as_integer())
            .collect()
    }

    /// Largest integer value in a column, if any.
    pub fn max_integer(&self, column: usize) -> Option<i64> {
        self.rows
            .iter()
            .filter_map(|row| row[column].as_integer())
            .max()
    }

    /// Debug-dump representation: a list of column-keyed objects.
    pub fn to_json(&self) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = self
            .rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row.iter())
                    .map(|(c, v)| (c.clone(), v.to_json()))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

/// The working set of merged tables, in load order.
///
/// Lookup is linear; a backup database holds a couple dozen tables at most.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: Vec<Table>,
}

impl TableSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when a table of this name has been loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    /// Look up a table by name.
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Look up a table mutably by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    /// Append a new table. Replaces nothing; the loader appends rows to an
    /// existing table instead of inserting twice.
    pub fn insert(&mut self, table: Table) {
        debug_assert!(!self.contains(&table.name));
        self.tables.push(table);
    }

    /// Table names in load order.
    pub fn names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    /// Table names with the given priority tables first (in the order
    /// given), followed by the remaining tables in load order.
    pub fn names_prioritized(&self, priority: &[&str]) -> Vec<String> {
        let mut ordered: Vec<String> = priority
            .iter()
            .filter(|p| self.contains(p))
            .map(|p| p.to_string())
            .collect();
        for table in &self.tables {
            if !priority.contains(&table.name.as_str()) {
                ordered.push(table.name.clone());
            }
        }
        ordered
    }

    /// Iterate tables in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Iterate tables mutably in load order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Table> {
        self.tables.iter_mut()
    }
}

//! Schema introspection.
//!
//! The merger discovers tables, primary key columns, foreign key edges, and
//! the SQL of every user index and trigger from one representative source
//! database. Subsequent sources are assumed schema-identical.

use std::collections::{BTreeSet, HashMap};

use rusqlite::Connection;

use jwlmerge_common::{Error, Result};

/// A directed foreign key edge: values in `child_table.child_column` must
/// appear in `parent_table.parent_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub child_table: String,
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
}

/// Everything the merger needs to know about a source database's schema.
#[derive(Debug, Clone)]
pub struct DbSchema {
    /// Table names in `sqlite_master` order, system tables excluded.
    pub tables: Vec<String>,
    primary_keys: HashMap<String, Vec<String>>,
    foreign_keys: Vec<ForeignKey>,
    /// SQL of every user index, deduplicated, in discovery order.
    pub index_sql: Vec<String>,
    /// SQL of every trigger, deduplicated, in discovery order.
    pub trigger_sql: Vec<String>,
}

impl DbSchema {
    /// Introspect a source database.
    ///
    /// Fails with [`Error::SourceUnreadable`] when the database holds no
    /// tables at all.
    pub fn introspect(conn: &Connection) -> Result<Self> {
        let tables = table_names(conn)?;
        if tables.is_empty() {
            return Err(Error::source_unreadable("database contains no tables"));
        }

        let mut primary_keys = HashMap::new();
        for table in &tables {
            primary_keys.insert(table.clone(), primary_key_columns(conn, table)?);
        }

        let mut foreign_keys = Vec::new();
        for table in &tables {
            foreign_keys.extend(foreign_key_edges(conn, table, &primary_keys)?);
        }

        let index_sql = object_sql(conn, "index")?;
        let trigger_sql = object_sql(conn, "trigger")?;

        tracing::debug!(
            tables = tables.len(),
            foreign_keys = foreign_keys.len(),
            indexes = index_sql.len(),
            triggers = trigger_sql.len(),
            "introspected source schema"
        );

        Ok(Self {
            tables,
            primary_keys,
            foreign_keys,
            index_sql,
            trigger_sql,
        })
    }

    /// Declared primary key columns of a table, in key order. Empty for
    /// keyless tables.
    pub fn primary_keys(&self, table: &str) -> &[String] {
        self.primary_keys
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first declared primary key column, if the table has one.
    pub fn first_primary_key(&self, table: &str) -> Option<&str> {
        self.primary_keys(table).first().map(String::as_str)
    }

    /// The sole primary key column, if the table declares exactly one.
    pub fn single_primary_key(&self, table: &str) -> Option<&str> {
        match self.primary_keys(table) {
            [only] => Some(only),
            _ => None,
        }
    }

    /// All foreign key edges in the schema.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// The edges whose parent side is `(parent_table, parent_column)`.
    pub fn references_to<'a>(
        &'a self,
        parent_table: &'a str,
        parent_column: &'a str,
    ) -> impl Iterator<Item = &'a ForeignKey> {
        self.foreign_keys.iter().filter(move |fk| {
            fk.parent_table == parent_table && fk.parent_column == parent_column
        })
    }

    /// The column names subject to cross-source offsetting: every foreign
    /// key child column plus every first primary key column named like an
    /// id (`…Id`).
    pub fn key_columns(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self
            .foreign_keys
            .iter()
            .map(|fk| fk.child_column.clone())
            .collect();
        for columns in self.primary_keys.values() {
            if let Some(first) = columns.first() {
                if first.ends_with("Id") {
                    keys.insert(first.clone());
                }
            }
        }
        keys
    }
}

fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")
        .map_err(|e| Error::source_unreadable(e.to_string()))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| Error::source_unreadable(e.to_string()))?;
    Ok(names)
}

fn primary_key_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info(?1) WHERE pk <> 0 ORDER BY pk")
        .map_err(|e| Error::database(e.to_string()))?;
    stmt.query_map([table], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| Error::database(e.to_string()))
}

fn foreign_key_edges(
    conn: &Connection,
    child_table: &str,
    primary_keys: &HashMap<String, Vec<String>>,
) -> Result<Vec<ForeignKey>> {
    let mut stmt = conn
        .prepare("SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1)")
        .map_err(|e| Error::database(e.to_string()))?;
    let edges = stmt
        .query_map([child_table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(edges
        .into_iter()
        .filter_map(|(parent_table, child_column, parent_column)| {
            // `REFERENCES T` without a column list reports NULL; resolve to
            // the parent's first primary key column.
            let parent_column = parent_column.or_else(|| {
                primary_keys
                    .get(&parent_table)
                    .and_then(|pks| pks.first().cloned())
            })?;
            Some(ForeignKey {
                child_table: child_table.to_string(),
                child_column,
                parent_table,
                parent_column,
            })
        })
        .collect())
}

fn object_sql(conn: &Connection, kind: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT sql FROM sqlite_master WHERE type = ?1")
        .map_err(|e| Error::database(e.to_string()))?;
    let sql: Vec<Option<String>> = stmt
        .query_map([kind], |row| row.get(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| Error::database(e.to_string()))?;

    // Auto-created objects carry NULL sql; duplicates can appear when the
    // same definition exists under several names.
    let mut seen = BTreeSet::new();
    Ok(sql
        .into_iter()
        .flatten()
        .filter(|s| seen.insert(s.clone()))
        .collect())
}

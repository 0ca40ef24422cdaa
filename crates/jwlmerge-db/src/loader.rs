//! Table loading with cross-source key offsetting.
//!
//! The first source's tables are stored as read. Every later source has its
//! key columns shifted by an offset floor before its rows are appended, so
//! primary keys from distinct sources can never collide. Nulls are
//! normalized to empty strings as rows enter the working set.

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use jwlmerge_common::{Error, Result};

use crate::schema::DbSchema;
use crate::table::{Table, TableSet, Value};

/// Key-offset stride. One source may hold at most this many rows per
/// keyspace; the floor is recomputed from observed maxima per source, so
/// larger backups widen the stride on their own.
const STRIDE: i64 = 100_000;

/// The offset added to every key column of the next source: the smallest
/// multiple of [`STRIDE`] strictly greater than the largest primary key
/// currently in the working set, or 0 when nothing is loaded yet.
pub fn offset_floor(set: &TableSet, schema: &DbSchema) -> i64 {
    let mut highest: Option<i64> = None;
    for table in set.iter() {
        if table.columns.len() == 1 {
            continue;
        }
        let Some(pk) = schema.first_primary_key(&table.name) else {
            continue;
        };
        let Some(column) = table.column_index(pk) else {
            continue;
        };
        if let Some(max) = table.max_integer(column) {
            highest = Some(highest.map_or(max, |h| h.max(max)));
        }
    }
    match highest {
        Some(max) => (max / STRIDE + 1) * STRIDE,
        None => 0,
    }
}

/// Load every table of one source database into the working set.
pub fn load_source(conn: &Connection, schema: &DbSchema, set: &mut TableSet) -> Result<()> {
    let floor = offset_floor(set, schema);
    let key_columns = schema.key_columns();

    for table_name in &schema.tables {
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM \"{table_name}\""))
            .map_err(|e| Error::database(format!("{table_name}: {e}")))?;
        let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();

        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut sql_rows = stmt
            .query([])
            .map_err(|e| Error::database(format!("{table_name}: {e}")))?;
        while let Some(row) = sql_rows
            .next()
            .map_err(|e| Error::database(format!("{table_name}: {e}")))?
        {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let cell = row
                    .get_ref(i)
                    .map_err(|e| Error::database(format!("{table_name}: {e}")))?;
                cells.push(value_from_ref(cell));
            }
            rows.push(cells);
        }

        tracing::debug!(table = %table_name, rows = rows.len(), floor, "loaded table");

        match set.get_mut(table_name) {
            Some(existing) => {
                // Single-column tables hold no keys worth offsetting.
                if columns.len() > 1 {
                    let shifted: Vec<usize> = columns
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| key_columns.contains(*c))
                        .map(|(i, _)| i)
                        .collect();
                    for row in &mut rows {
                        for &i in &shifted {
                            row[i] = row[i].offset_by(floor);
                        }
                    }
                }
                existing.rows.extend(rows);
                existing.normalize_nulls();
            }
            None => {
                let mut table = Table::new(table_name.clone(), columns);
                table.rows = rows;
                table.normalize_nulls();
                set.insert(table);
            }
        }
    }

    Ok(())
}

fn value_from_ref(cell: ValueRef<'_>) -> Value {
    match cell {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

//! Persistence write-back.
//!
//! The destination database starts life as a byte copy of the first source,
//! so its schema is already in place. The writer empties every tracked
//! table, stamps `LastModified`, restores the captured indexes and triggers,
//! and inserts the merged rows with cell normalization. Row failures are
//! collected and surfaced; they never abort the write.

use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

use jwlmerge_common::{Error, Result};

use crate::schema::DbSchema;
use crate::table::{Table, TableSet, Value};

/// A single row that failed to insert into the destination.
#[derive(Debug, Clone)]
pub struct InsertFailure {
    pub table: String,
    pub sql: String,
    pub row: String,
    pub error: String,
}

impl std::fmt::Display for InsertFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.table, self.error, self.row)
    }
}

/// Write the merged working set into the destination database.
///
/// Returns the list of rows that could not be inserted.
pub fn write_merged(
    conn: &mut Connection,
    set: &TableSet,
    schema: &DbSchema,
) -> Result<Vec<InsertFailure>> {
    drop_objects(conn, "trigger", "DROP TRIGGER IF EXISTS")?;
    drop_objects(conn, "index", "DROP INDEX IF EXISTS")?;

    for table in set.iter() {
        conn.execute(&format!("DELETE FROM \"{}\"", table.name), [])
            .map_err(|e| Error::database(format!("emptying {}: {e}", table.name)))?;
    }

    if set.contains("LastModified") {
        let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        conn.execute(
            "INSERT OR REPLACE INTO LastModified (LastModified) VALUES (?1)",
            [&stamp],
        )
        .map_err(|e| Error::database(format!("stamping LastModified: {e}")))?;
    }

    for sql in schema.index_sql.iter().chain(schema.trigger_sql.iter()) {
        conn.execute_batch(sql)
            .map_err(|e| Error::database(format!("restoring schema object: {e}")))?;
    }

    conn.execute_batch("VACUUM")
        .map_err(|e| Error::database(e.to_string()))?;

    let mut failures = Vec::new();
    for table in set.iter() {
        if table.name == "LastModified" {
            continue;
        }
        insert_table(conn, table, &mut failures)?;
    }

    if !failures.is_empty() {
        tracing::warn!(count = failures.len(), "rows failed to insert");
    }

    conn.execute_batch("VACUUM")
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(failures)
}

fn drop_objects(conn: &Connection, kind: &str, drop_stmt: &str) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = ?1 AND name NOT LIKE 'sqlite_%'")
        .map_err(|e| Error::database(e.to_string()))?;
    let names: Vec<String> = stmt
        .query_map([kind], |row| row.get(0))
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| Error::database(e.to_string()))?;
    drop(stmt);

    for name in names {
        conn.execute(&format!("{drop_stmt} \"{name}\""), [])
            .map_err(|e| Error::database(format!("dropping {name}: {e}")))?;
    }
    Ok(())
}

fn insert_table(
    conn: &mut Connection,
    table: &Table,
    failures: &mut Vec<InsertFailure>,
) -> Result<()> {
    let column_list = table
        .columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; table.columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO \"{}\" ({column_list}) VALUES ({placeholders})",
        table.name
    );

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;
    {
        let mut stmt = tx
            .prepare(&sql)
            .map_err(|e| Error::database(format!("{}: {e}", table.name)))?;
        for row in &table.rows {
            let cells: Vec<SqlValue> = table
                .columns
                .iter()
                .zip(row.iter())
                .map(|(column, value)| normalize_cell(column, value))
                .collect();
            if let Err(e) = stmt.execute(rusqlite::params_from_iter(cells)) {
                failures.push(InsertFailure {
                    table: table.name.clone(),
                    sql: sql.clone(),
                    row: render_row(table, row),
                    error: e.to_string(),
                });
            }
        }
    }
    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    tracing::debug!(table = %table.name, rows = table.rows.len(), "inserted merged rows");
    Ok(())
}

/// Normalize one cell for the destination:
///
/// - empty strings become NULL, unless the column name contains `Text` or
///   `Value` (those columns legitimately hold empty text)
/// - text that is a plain digit string becomes an integer
/// - everything else passes through
fn normalize_cell(column: &str, value: &Value) -> SqlValue {
    match value {
        Value::Text(s) if s.is_empty() => {
            if column.contains("Text") || column.contains("Value") {
                SqlValue::Text(String::new())
            } else {
                SqlValue::Null
            }
        }
        Value::Text(s) if is_digit_string(s) => match s.parse::<i64>() {
            Ok(i) => SqlValue::Integer(i),
            Err(_) => SqlValue::Text(s.clone()),
        },
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(f) => SqlValue::Real(*f),
        Value::Null => SqlValue::Null,
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

fn is_digit_string(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn render_row(table: &Table, row: &[Value]) -> String {
    let obj: serde_json::Map<String, serde_json::Value> = table
        .columns
        .iter()
        .zip(row.iter())
        .map(|(c, v)| (c.clone(), v.to_json()))
        .collect();
    serde_json::Value::Object(obj).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::open_destination;

    fn dest_db(dir: &std::path::Path) -> Connection {
        let conn = open_destination(dir.join("dest.db")).unwrap();
        conn.execute_batch(
            "CREATE TABLE Note (
                 NoteId INTEGER NOT NULL PRIMARY KEY,
                 LocationId INTEGER,
                 Title TEXT,
                 Content TEXT
             );
             CREATE TABLE InputField (
                 LocationId INTEGER NOT NULL,
                 TextTag TEXT NOT NULL,
                 Value TEXT NOT NULL,
                 PRIMARY KEY (LocationId, TextTag)
             );
             CREATE TABLE LastModified (LastModified TEXT NOT NULL);
             CREATE INDEX IX_Note_LocationId ON Note (LocationId);
             INSERT INTO Note (NoteId, LocationId, Title, Content) VALUES (99, 1, 'stale', 'stale');
             INSERT INTO LastModified (LastModified) VALUES ('2020-01-01T00:00:00Z');",
        )
        .unwrap();
        conn
    }

    fn working_set() -> TableSet {
        let mut set = TableSet::new();

        let mut note = Table::new(
            "Note",
            vec!["NoteId", "LocationId", "Title", "Content"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        note.rows = vec![
            vec![
                Value::Integer(1),
                Value::Text("7".to_string()),
                Value::Text("kept".to_string()),
                Value::Text(String::new()),
            ],
            vec![
                Value::Integer(2),
                Value::Text(String::new()),
                Value::Text("other".to_string()),
                Value::Text("body".to_string()),
            ],
        ];
        set.insert(note);

        let mut input = Table::new(
            "InputField",
            vec!["LocationId", "TextTag", "Value"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        input.rows = vec![vec![
            Value::Integer(7),
            Value::Text("tt1".to_string()),
            Value::Text(String::new()),
        ]];
        set.insert(input);

        let mut last_modified = Table::new("LastModified", vec!["LastModified".to_string()]);
        last_modified.rows = vec![vec![Value::Text("2020-01-01T00:00:00Z".to_string())]];
        set.insert(last_modified);

        set
    }

    fn schema_of(conn: &Connection) -> DbSchema {
        DbSchema::introspect(conn).unwrap()
    }

    #[test]
    fn test_write_replaces_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = dest_db(dir.path());
        let schema = schema_of(&conn);

        let failures = write_merged(&mut conn, &working_set(), &schema).unwrap();
        assert!(failures.is_empty());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Note", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let stale: i64 = conn
            .query_row("SELECT COUNT(*) FROM Note WHERE NoteId = 99", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stale, 0);
    }

    #[test]
    fn test_cell_normalization_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = dest_db(dir.path());
        let schema = schema_of(&conn);

        write_merged(&mut conn, &working_set(), &schema).unwrap();

        // Digit strings become integers.
        let location: i64 = conn
            .query_row("SELECT LocationId FROM Note WHERE NoteId = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(location, 7);

        // Empty strings become NULL outside Text/Value columns...
        let null_location: Option<i64> = conn
            .query_row("SELECT LocationId FROM Note WHERE NoteId = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(null_location, None);

        // ...but stay empty text inside them.
        let value: String = conn
            .query_row("SELECT Value FROM InputField WHERE LocationId = 7", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(value, "");
    }

    #[test]
    fn test_last_modified_is_restamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = dest_db(dir.path());
        let schema = schema_of(&conn);

        write_merged(&mut conn, &working_set(), &schema).unwrap();

        let (count, stamp): (i64, String) = conn
            .query_row("SELECT COUNT(*), MAX(LastModified) FROM LastModified", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert!(stamp.ends_with('Z'));
        assert_ne!(stamp, "2020-01-01T00:00:00Z");
    }

    #[test]
    fn test_indexes_are_restored() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = dest_db(dir.path());
        let schema = schema_of(&conn);

        write_merged(&mut conn, &working_set(), &schema).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'IX_Note_LocationId'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_insert_failures_are_collected_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = dest_db(dir.path());
        let schema = schema_of(&conn);

        let mut set = working_set();
        // Second row with a duplicate primary key cannot insert.
        let note = set.get_mut("Note").unwrap();
        let mut dup = note.rows[0].clone();
        dup[2] = Value::Text("duplicate pk".to_string());
        note.rows.push(dup);

        let failures = write_merged(&mut conn, &set, &schema).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].table, "Note");
        assert!(failures[0].error.contains("UNIQUE"));

        // The rest of the table still made it in.
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Note", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}

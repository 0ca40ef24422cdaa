//! Connection helpers.
//!
//! Sources are opened read-only and closed as soon as their tables are in
//! memory; the destination is opened once by the writer. Foreign key
//! enforcement stays off on the destination because merged tables are
//! inserted in working-set order, not topological order.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use jwlmerge_common::{Error, Result};

/// Open a source database read-only.
pub fn open_source<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| Error::source_unreadable(format!("{}: {e}", path.display())))
}

/// Open the destination database for the write-back.
pub fn open_destination<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open(path)
        .map_err(|e| Error::database(format!("{}: {e}", path.display())))?;
    conn.execute_batch("PRAGMA foreign_keys = OFF;")
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(conn)
}

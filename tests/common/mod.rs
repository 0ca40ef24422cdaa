//! Shared fixtures for integration tests.
//!
//! Provides builders for realistic source databases (the backup schema
//! subset the merger recognizes, with real foreign keys and indexes) and
//! for complete `.jwlibrary` archives wrapping them.

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rusqlite::Connection;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Schema mirroring the user-data backup database.
pub const SCHEMA: &str = "
    CREATE TABLE Location (
        LocationId INTEGER NOT NULL PRIMARY KEY,
        BookNumber INTEGER,
        ChapterNumber INTEGER,
        DocumentId INTEGER,
        Track INTEGER,
        IssueTagNumber INTEGER NOT NULL DEFAULT 0,
        KeySymbol TEXT,
        MepsLanguage INTEGER,
        Type INTEGER NOT NULL DEFAULT 0,
        Title TEXT
    );
    CREATE TABLE IndependentMedia (
        IndependentMediaId INTEGER NOT NULL PRIMARY KEY,
        OriginalFilename TEXT NOT NULL,
        FilePath TEXT NOT NULL,
        MimeType TEXT NOT NULL,
        Hash TEXT NOT NULL
    );
    CREATE TABLE UserMark (
        UserMarkId INTEGER NOT NULL PRIMARY KEY,
        ColorIndex INTEGER NOT NULL,
        LocationId INTEGER NOT NULL REFERENCES Location (LocationId),
        StyleIndex INTEGER NOT NULL,
        UserMarkGuid TEXT NOT NULL UNIQUE,
        Version INTEGER NOT NULL
    );
    CREATE TABLE BlockRange (
        BlockRangeId INTEGER NOT NULL PRIMARY KEY,
        BlockType INTEGER NOT NULL,
        Identifier INTEGER NOT NULL,
        StartToken INTEGER,
        EndToken INTEGER,
        UserMarkId INTEGER NOT NULL REFERENCES UserMark (UserMarkId)
    );
    CREATE TABLE Note (
        NoteId INTEGER NOT NULL PRIMARY KEY,
        Guid TEXT NOT NULL UNIQUE,
        UserMarkId INTEGER REFERENCES UserMark (UserMarkId),
        LocationId INTEGER REFERENCES Location (LocationId),
        Title TEXT,
        Content TEXT,
        LastModified TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
        Created TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
        BlockType INTEGER NOT NULL DEFAULT 0,
        BlockIdentifier INTEGER
    );
    CREATE TABLE Tag (
        TagId INTEGER NOT NULL PRIMARY KEY,
        Type INTEGER NOT NULL DEFAULT 0,
        Name TEXT NOT NULL
    );
    CREATE TABLE PlaylistItem (
        PlaylistItemId INTEGER NOT NULL PRIMARY KEY,
        Label TEXT NOT NULL,
        StartTrimOffsetTicks INTEGER,
        EndTrimOffsetTicks INTEGER,
        Accuracy INTEGER NOT NULL,
        EndAction INTEGER NOT NULL,
        ThumbnailFilePath TEXT
    );
    CREATE TABLE TagMap (
        TagMapId INTEGER NOT NULL PRIMARY KEY,
        PlaylistItemId INTEGER REFERENCES PlaylistItem (PlaylistItemId),
        LocationId INTEGER REFERENCES Location (LocationId),
        NoteId INTEGER REFERENCES Note (NoteId),
        TagId INTEGER NOT NULL REFERENCES Tag (TagId),
        Position INTEGER NOT NULL
    );
    CREATE TABLE Bookmark (
        BookmarkId INTEGER NOT NULL PRIMARY KEY,
        LocationId INTEGER NOT NULL REFERENCES Location (LocationId),
        PublicationLocationId INTEGER NOT NULL REFERENCES Location (LocationId),
        Slot INTEGER NOT NULL,
        Title TEXT NOT NULL,
        Snippet TEXT,
        BlockType INTEGER NOT NULL DEFAULT 0,
        BlockIdentifier INTEGER
    );
    CREATE TABLE InputField (
        LocationId INTEGER NOT NULL REFERENCES Location (LocationId),
        TextTag TEXT NOT NULL,
        Value TEXT NOT NULL,
        PRIMARY KEY (LocationId, TextTag)
    );
    CREATE TABLE PlaylistItemIndependentMediaMap (
        PlaylistItemId INTEGER NOT NULL REFERENCES PlaylistItem (PlaylistItemId),
        IndependentMediaId INTEGER NOT NULL REFERENCES IndependentMedia (IndependentMediaId),
        DurationTicks INTEGER NOT NULL,
        PRIMARY KEY (PlaylistItemId, IndependentMediaId)
    );
    CREATE TABLE LastModified (LastModified TEXT NOT NULL);
    CREATE INDEX IX_Note_LocationId ON Note (LocationId);
    CREATE INDEX IX_TagMap_NoteId ON TagMap (NoteId);
    INSERT INTO LastModified (LastModified) VALUES ('2024-01-01T00:00:00Z');
";

/// Manifest matching the fixture database.
pub const MANIFEST_JSON: &str = r#"{
  "name": "UserdataBackup_2024-01-01_test.jwlibrary",
  "creationDate": "2024-01-01T00:00:00-0500",
  "version": 1,
  "type": 0,
  "userDataBackup": {
    "lastModifiedDate": "2024-01-01T00:00:00-0500",
    "deviceName": "test-device",
    "databaseName": "userData.db",
    "hash": "0",
    "schemaVersion": 14
  }
}"#;

/// Create a source database with the fixture schema at `path`.
pub fn create_source_db(path: &Path) -> Connection {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn
}

/// Insert a location.
pub fn insert_location(conn: &Connection, id: i64, document: i64) {
    conn.execute(
        "INSERT INTO Location (LocationId, BookNumber, ChapterNumber, DocumentId, Track,
                               IssueTagNumber, KeySymbol, MepsLanguage, Type, Title)
         VALUES (?1, NULL, NULL, ?2, NULL, 0, 'nwt', 0, 0, NULL)",
        rusqlite::params![id, document],
    )
    .unwrap();
}

/// Insert a note.
pub fn insert_note(
    conn: &Connection,
    id: i64,
    guid: &str,
    location: Option<i64>,
    title: &str,
    content: &str,
    modified: &str,
) {
    conn.execute(
        "INSERT INTO Note (NoteId, Guid, UserMarkId, LocationId, Title, Content,
                           LastModified, Created, BlockType, BlockIdentifier)
         VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?6, 0, NULL)",
        rusqlite::params![id, guid, location, title, content, modified],
    )
    .unwrap();
}

/// Insert a tag.
pub fn insert_tag(conn: &Connection, id: i64, name: &str) {
    conn.execute(
        "INSERT INTO Tag (TagId, Type, Name) VALUES (?1, 1, ?2)",
        rusqlite::params![id, name],
    )
    .unwrap();
}

/// Map a tag onto a note.
pub fn insert_tag_map(conn: &Connection, id: i64, tag: i64, note: i64, position: i64) {
    conn.execute(
        "INSERT INTO TagMap (TagMapId, PlaylistItemId, LocationId, NoteId, TagId, Position)
         VALUES (?1, NULL, NULL, ?2, ?3, ?4)",
        rusqlite::params![id, note, tag, position],
    )
    .unwrap();
}

/// Insert a highlight with one block range on the given location.
pub fn insert_user_mark(conn: &Connection, id: i64, guid: &str, location: i64, color: i64) {
    conn.execute(
        "INSERT INTO UserMark (UserMarkId, ColorIndex, LocationId, StyleIndex, UserMarkGuid, Version)
         VALUES (?1, ?2, ?3, 0, ?4, 1)",
        rusqlite::params![id, color, location, guid],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO BlockRange (BlockRangeId, BlockType, Identifier, StartToken, EndToken, UserMarkId)
         VALUES (?1, 1, 1, 0, 7, ?1)",
        [id],
    )
    .unwrap();
}

/// Insert a playlist item with an attached media file.
pub fn insert_playlist_media(conn: &Connection, id: i64, label: &str, file_path: &str) {
    conn.execute(
        "INSERT INTO PlaylistItem (PlaylistItemId, Label, StartTrimOffsetTicks,
                                   EndTrimOffsetTicks, Accuracy, EndAction, ThumbnailFilePath)
         VALUES (?1, ?2, NULL, NULL, 0, 0, NULL)",
        rusqlite::params![id, label],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO IndependentMedia (IndependentMediaId, OriginalFilename, FilePath, MimeType, Hash)
         VALUES (?1, ?2, ?2, 'audio/mpeg', 'cafe')",
        rusqlite::params![id, file_path],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO PlaylistItemIndependentMediaMap (PlaylistItemId, IndependentMediaId, DurationTicks)
         VALUES (?1, ?1, 1000)",
        [id],
    )
    .unwrap();
}

/// Build a complete `.jwlibrary` archive whose database is populated by
/// `setup`.
pub fn make_backup_archive(archive_path: &Path, setup: impl FnOnce(&Connection)) {
    let scratch = tempfile::tempdir().unwrap();
    let db_path = scratch.path().join("userData.db");
    let conn = create_source_db(&db_path);
    setup(&conn);
    drop(conn);

    let file = File::create(archive_path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    zip.start_file("userData.db", options).unwrap();
    zip.write_all(&std::fs::read(&db_path).unwrap()).unwrap();
    zip.start_file("manifest.json", options).unwrap();
    zip.write_all(MANIFEST_JSON.as_bytes()).unwrap();
    zip.finish().unwrap();
}

/// Row count of a table.
pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |r| r.get(0))
        .unwrap()
}

/// Assert that every declared foreign key in the database resolves.
pub fn assert_referential_integrity(conn: &Connection) {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check").unwrap();
    let violations: Vec<String> = stmt
        .query_map([], |row| {
            Ok(format!(
                "{}: rowid {:?} -> {}",
                row.get::<_, String>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, String>(2)?
            ))
        })
        .unwrap()
        .filter_map(|r| r.ok())
        .collect();
    assert!(violations.is_empty(), "dangling references: {violations:?}");
}

/// Assert that a table's keys form a dense 1..N sequence.
pub fn assert_dense_keys(conn: &Connection, table: &str, pk: &str) {
    let (count, min, max): (i64, Option<i64>, Option<i64>) = conn
        .query_row(
            &format!("SELECT COUNT(*), MIN(\"{pk}\"), MAX(\"{pk}\") FROM \"{table}\""),
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    if count > 0 {
        assert_eq!(min, Some(1), "{table}.{pk} does not start at 1");
        assert_eq!(max, Some(count), "{table}.{pk} has gaps");
    }
}

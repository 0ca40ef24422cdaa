//! The domain catalog: per-table merge policy for the backup schema.
//!
//! The merge mechanics are schema-generic; everything the merger knows about
//! the backup schema specifically is declared here.

/// Tables whose identities must settle before their dependents are
/// rewritten. They are processed first, in this order; all remaining tables
/// follow in load order.
pub const TABLE_PRIORITY: &[&str] = &[
    "Location",
    "IndependentMedia",
    "UserMark",
    "Note",
    "Bookmark",
    "PlaylistItem",
    "Tag",
];

/// Declared unique constraints, applied in this order. Two rows sharing a
/// constraint tuple describe the same entity and are folded onto one
/// survivor.
pub const UNIQUE_CONSTRAINTS: &[(&str, &[&[&str]])] = &[
    (
        "Location",
        &[&[
            "BookNumber",
            "ChapterNumber",
            "DocumentId",
            "Track",
            "IssueTagNumber",
            "KeySymbol",
            "MepsLanguage",
            "Type",
        ]],
    ),
    ("Bookmark", &[&["PublicationLocationId", "Slot"]]),
    ("InputField", &[&["LocationId", "TextTag"]]),
    (
        "Note",
        &[
            &["Guid"],
            &["LocationId", "Title", "Content", "BlockType", "BlockIdentifier"],
        ],
    ),
    ("UserMark", &[&["UserMarkGuid"]]),
    (
        "BlockRange",
        &[&["BlockType", "Identifier", "StartToken", "EndToken", "UserMarkId"]],
    ),
    (
        "TagMap",
        &[
            &["TagId", "NoteId"],
            &["TagId", "LocationId"],
            &["TagId", "PlaylistItemId"],
            &["TagId", "Position"],
        ],
    ),
];

/// Tables whose colliding rows merge their text content instead of being
/// remapped away, and the columns merged.
pub const TEXT_MERGE_COLUMNS: &[(&str, &[&str])] = &[
    ("Bookmark", &["Title", "Snippet"]),
    ("InputField", &["Value"]),
    ("Note", &["Title", "Content"]),
];

/// Tables deduplicated a final time while ignoring one user-chosen display
/// or ordering attribute.
pub const IGNORED_DEDUP_COLUMNS: &[(&str, &str)] = &[
    ("TagMap", "Position"),
    ("UserMark", "ColorIndex"),
    ("Location", "Title"),
];

/// Rows of `Note` are sorted by this column, descending, before constraint
/// merging so the most recently edited note survives.
pub const NOTE_RECENCY_COLUMN: &str = "LastModified";

/// Constraint rows of this table are only considered when every constraint
/// column is populated.
pub const REQUIRE_POPULATED_CONSTRAINTS: &[&str] = &["TagMap"];

/// Columns whose values name media files that must travel with the archive.
pub const MEDIA_FILE_COLUMNS: &[(&str, &str)] = &[
    ("IndependentMedia", "FilePath"),
    ("PlaylistItem", "ThumbnailFilePath"),
];

/// Text-merge columns declared for a table, if any.
pub fn text_merge_columns(table: &str) -> Option<&'static [&'static str]> {
    TEXT_MERGE_COLUMNS
        .iter()
        .find(|(t, _)| *t == table)
        .map(|(_, columns)| *columns)
}

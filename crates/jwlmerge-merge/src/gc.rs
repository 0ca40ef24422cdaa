//! Referential garbage collection.
//!
//! After reconciliation, some rows no longer carry user data: notes with no
//! text and no tag, media nobody plays, highlight ranges whose mark is gone,
//! locations nothing points at. Each rule deletes the rows and cascades one
//! level through the outgoing foreign key edges.

use std::collections::HashSet;

use jwlmerge_db::{DbSchema, TableSet};

/// Delete every note whose `Title` and `Content` are both empty and whose
/// key does not appear in `TagMap.NoteId`, cascading through the foreign
/// key edges out of `Note`.
pub fn prune_empty_untagged_notes(set: &mut TableSet, schema: &DbSchema) {
    let Some(pk) = schema.first_primary_key("Note").map(str::to_string) else {
        return;
    };
    let tagged: HashSet<i64> = set
        .get("TagMap")
        .and_then(|t| t.column_index("NoteId").map(|c| t.integer_values(c)))
        .unwrap_or_default();

    let doomed = {
        let Some(note) = set.get("Note") else { return };
        let (Some(pk_column), Some(title), Some(content)) = (
            note.column_index(&pk),
            note.column_index("Title"),
            note.column_index("Content"),
        ) else {
            return;
        };
        note.rows
            .iter()
            .filter(|row| row[title].is_empty() && row[content].is_empty())
            .filter_map(|row| row[pk_column].as_integer())
            .filter(|id| !tagged.contains(id))
            .collect::<HashSet<i64>>()
    };

    if !doomed.is_empty() {
        tracing::debug!(count = doomed.len(), "pruning empty untagged notes");
    }
    delete_and_cascade(set, schema, "Note", &pk, &doomed);
}

/// Delete every media row that no playlist item references, cascading.
pub fn prune_orphan_media(set: &mut TableSet, schema: &DbSchema) {
    if !set.contains("IndependentMedia") || !set.contains("PlaylistItemIndependentMediaMap") {
        return;
    }
    let Some(pk) = schema
        .first_primary_key("IndependentMedia")
        .map(str::to_string)
    else {
        return;
    };
    let referenced: HashSet<i64> = set
        .get("PlaylistItemIndependentMediaMap")
        .and_then(|t| {
            t.column_index("IndependentMediaId")
                .map(|c| t.integer_values(c))
        })
        .unwrap_or_default();

    let doomed = orphans(set, "IndependentMedia", &pk, &referenced);
    if !doomed.is_empty() {
        tracing::debug!(count = doomed.len(), "pruning unreferenced media");
    }
    delete_and_cascade(set, schema, "IndependentMedia", &pk, &doomed);
}

/// Delete every highlight range whose `UserMarkId` no longer exists,
/// cascading.
pub fn prune_orphan_block_ranges(set: &mut TableSet, schema: &DbSchema) {
    if !set.contains("BlockRange") {
        return;
    }
    let Some(pk) = schema.first_primary_key("BlockRange").map(str::to_string) else {
        return;
    };
    let marks: HashSet<i64> = set
        .get("UserMark")
        .and_then(|t| t.column_index("UserMarkId").map(|c| t.integer_values(c)))
        .unwrap_or_default();

    let doomed = {
        let Some(block_range) = set.get("BlockRange") else {
            return;
        };
        let (Some(pk_column), Some(mark_column)) = (
            block_range.column_index(&pk),
            block_range.column_index("UserMarkId"),
        ) else {
            return;
        };
        block_range
            .rows
            .iter()
            .filter(|row| {
                row[mark_column]
                    .as_integer()
                    .map_or(true, |id| !marks.contains(&id))
            })
            .filter_map(|row| row[pk_column].as_integer())
            .collect::<HashSet<i64>>()
    };

    if !doomed.is_empty() {
        tracing::debug!(count = doomed.len(), "pruning obsolete highlight ranges");
    }
    delete_and_cascade(set, schema, "BlockRange", &pk, &doomed);
}

/// Delete every location no remaining table references. Locations are
/// leaves of the deletion order by now, so there is nothing to cascade.
pub fn prune_orphan_locations(set: &mut TableSet, schema: &DbSchema) {
    let Some(pk) = schema.first_primary_key("Location").map(str::to_string) else {
        return;
    };

    let mut referenced: HashSet<i64> = HashSet::new();
    for fk in schema.references_to("Location", &pk) {
        if let Some(child) = set.get(&fk.child_table) {
            if let Some(column) = child.column_index(&fk.child_column) {
                referenced.extend(child.integer_values(column));
            }
        }
    }

    let doomed = orphans(set, "Location", &pk, &referenced);
    if doomed.is_empty() {
        return;
    }
    tracing::debug!(count = doomed.len(), "pruning unreferenced locations");

    let Some(location) = set.get_mut("Location") else {
        return;
    };
    let Some(pk_column) = location.column_index(&pk) else {
        return;
    };
    location.rows.retain(|row| {
        row[pk_column]
            .as_integer()
            .map_or(true, |id| !doomed.contains(&id))
    });
}

/// Keys of `table` rows absent from `referenced`.
fn orphans(set: &TableSet, table: &str, pk: &str, referenced: &HashSet<i64>) -> HashSet<i64> {
    let Some(table) = set.get(table) else {
        return HashSet::new();
    };
    let Some(pk_column) = table.column_index(pk) else {
        return HashSet::new();
    };
    table
        .rows
        .iter()
        .filter_map(|row| row[pk_column].as_integer())
        .filter(|id| !referenced.contains(id))
        .collect()
}

/// Delete the rows of `table` whose key is in `doomed`, then delete every
/// row of a child table that references one of those keys.
fn delete_and_cascade(
    set: &mut TableSet,
    schema: &DbSchema,
    table: &str,
    pk: &str,
    doomed: &HashSet<i64>,
) {
    if doomed.is_empty() {
        return;
    }

    if let Some(target) = set.get_mut(table) {
        if let Some(pk_column) = target.column_index(pk) {
            target.rows.retain(|row| {
                row[pk_column]
                    .as_integer()
                    .map_or(true, |id| !doomed.contains(&id))
            });
        }
    }

    for fk in schema.references_to(table, pk) {
        if let Some(child) = set.get_mut(&fk.child_table) {
            if let Some(column) = child.column_index(&fk.child_column) {
                child.rows.retain(|row| {
                    row[column]
                        .as_integer()
                        .map_or(true, |id| !doomed.contains(&id))
                });
            }
        }
    }
}

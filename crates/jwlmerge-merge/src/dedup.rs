//! Identity reconciliation.
//!
//! Distinct backups assign disjoint primary keys to the same real-world
//! entity, so after loading, the working set holds one row per (source,
//! entity) pair. Reconciliation folds those onto one row per entity: first
//! by exact row equality, then by the declared unique constraints, always
//! rewriting every foreign key onto the survivor and dropping rows the
//! rewrite made redundant.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use jwlmerge_db::{DbSchema, Table, TableSet, Value};

use crate::catalog::{
    self, IGNORED_DEDUP_COLUMNS, NOTE_RECENCY_COLUMN, REQUIRE_POPULATED_CONSTRAINTS,
    UNIQUE_CONSTRAINTS,
};
use crate::textmerge::merge_text;

/// Rewrite a table's primary key column through `map`, then drop rows the
/// rewrite made identical.
pub(crate) fn remap_primary_key(
    set: &mut TableSet,
    table: &str,
    pk: &str,
    map: &HashMap<i64, i64>,
) {
    if let Some(table) = set.get_mut(table) {
        if let Some(column) = table.column_index(pk) {
            table.remap_integer_column(column, map);
            table.dedup_exact();
        }
    }
}

/// Rewrite every foreign key column referencing `(table, pk)` through
/// `map`, dropping rows the rewrite made identical in each child table.
pub(crate) fn remap_foreign_keys(
    set: &mut TableSet,
    schema: &DbSchema,
    table: &str,
    pk: &str,
    map: &HashMap<i64, i64>,
) {
    for fk in schema.references_to(table, pk) {
        if let Some(child) = set.get_mut(&fk.child_table) {
            if let Some(column) = child.column_index(&fk.child_column) {
                child.remap_integer_column(column, map);
                child.dedup_exact();
            }
        }
    }
}

/// Phase A: collapse rows that are identical in every column except the
/// primary key, folding their keys onto the first occurrence.
///
/// Single-column and keyless tables carry nothing to remap; their identical
/// rows simply collapse.
pub fn collapse_exact_duplicates(set: &mut TableSet, schema: &DbSchema, order: &[String]) {
    for table_name in order {
        let Some(table) = set.get(table_name) else {
            continue;
        };

        let pk = match schema.first_primary_key(table_name) {
            Some(pk) if table.columns.len() > 1 => pk.to_string(),
            _ => {
                if let Some(table) = set.get_mut(table_name) {
                    table.dedup_exact();
                }
                continue;
            }
        };
        let Some(pk_column) = table.column_index(&pk) else {
            continue;
        };

        let map = exact_duplicate_map(table, pk_column);
        if !map.is_empty() {
            tracing::debug!(table = %table_name, folded = map.len(), "collapsed exact duplicates");
        }
        remap_foreign_keys(set, schema, table_name, &pk, &map);
        remap_primary_key(set, table_name, &pk, &map);
    }
}

fn exact_duplicate_map(table: &Table, pk_column: usize) -> HashMap<i64, i64> {
    let mut first_seen: HashMap<Vec<Value>, i64> = HashMap::new();
    let mut map = HashMap::new();
    for row in &table.rows {
        let Some(pk_value) = row[pk_column].as_integer() else {
            continue;
        };
        let natural_key: Vec<Value> = row
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pk_column)
            .map(|(_, v)| v.clone())
            .collect();
        match first_seen.entry(natural_key) {
            Entry::Occupied(survivor) => {
                map.insert(pk_value, *survivor.get());
            }
            Entry::Vacant(slot) => {
                slot.insert(pk_value);
            }
        }
    }
    map
}

/// Phase B: fold rows colliding on a declared unique constraint.
///
/// Notes are pre-sorted most-recent-first so the latest edit survives; the
/// text-merge tables keep both sides' content as a line diff instead of
/// remapping the dropped key inside the table itself. Either way dependents
/// are rewritten onto the survivor.
pub fn apply_unique_constraints(set: &mut TableSet, schema: &DbSchema) {
    for (table_name, subsets) in UNIQUE_CONSTRAINTS {
        if !set.contains(table_name) {
            continue;
        }
        for subset in *subsets {
            if *table_name == "Note" {
                if let Some(note) = set.get_mut(table_name) {
                    if let Some(recency) = note.column_index(NOTE_RECENCY_COLUMN) {
                        note.sort_by_column_desc(recency);
                    }
                }
            }

            let Some(pk) = schema.first_primary_key(table_name).map(str::to_string) else {
                break;
            };
            let pairs = {
                let Some(table) = set.get(table_name) else {
                    break;
                };
                let Some(pk_column) = table.column_index(&pk) else {
                    break;
                };
                let Some(subset_columns) = subset
                    .iter()
                    .map(|c| table.column_index(c))
                    .collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                collision_pairs(
                    table,
                    pk_column,
                    &subset_columns,
                    REQUIRE_POPULATED_CONSTRAINTS.contains(table_name),
                )
            };
            if pairs.is_empty() {
                continue;
            }

            tracing::debug!(
                table = %table_name,
                constraint = ?subset,
                folded = pairs.len(),
                "merged unique-constraint collisions"
            );

            let map: HashMap<i64, i64> = pairs.iter().copied().collect();
            if let Some(text_columns) = catalog::text_merge_columns(table_name) {
                if let Some(table) = set.get_mut(table_name) {
                    merge_collided_rows(table, &pk, &pairs, text_columns);
                }
            } else {
                remap_primary_key(set, table_name, &pk, &map);
            }
            remap_foreign_keys(set, schema, table_name, &pk, &map);
        }
    }
}

/// `(dropped, survivor)` key pairs for rows sharing a constraint tuple, in
/// row order. The first row of each group survives.
fn collision_pairs(
    table: &Table,
    pk_column: usize,
    subset: &[usize],
    require_populated: bool,
) -> Vec<(i64, i64)> {
    let mut first_seen: HashMap<Vec<Value>, i64> = HashMap::new();
    let mut pairs = Vec::new();
    for row in &table.rows {
        if require_populated && subset.iter().any(|&i| row[i].is_empty()) {
            continue;
        }
        let Some(pk_value) = row[pk_column].as_integer() else {
            continue;
        };
        let key: Vec<Value> = subset.iter().map(|&i| row[i].clone()).collect();
        match first_seen.entry(key) {
            Entry::Occupied(survivor) => pairs.push((pk_value, *survivor.get())),
            Entry::Vacant(slot) => {
                slot.insert(pk_value);
            }
        }
    }
    pairs
}

fn merge_collided_rows(table: &mut Table, pk: &str, pairs: &[(i64, i64)], text_columns: &[&str]) {
    let Some(pk_column) = table.column_index(pk) else {
        return;
    };
    let merge_columns: Vec<usize> = text_columns
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();

    for &(dropped, survivor) in pairs {
        let Some(dropped_row) = row_position(table, pk_column, dropped) else {
            continue;
        };
        let Some(survivor_row) = row_position(table, pk_column, survivor) else {
            continue;
        };
        for &column in &merge_columns {
            let dropped_text = table.rows[dropped_row][column]
                .as_text()
                .unwrap_or_default()
                .to_string();
            let survivor_text = table.rows[survivor_row][column]
                .as_text()
                .unwrap_or_default()
                .to_string();
            if !dropped_text.is_empty() && dropped_text.trim() != survivor_text.trim() {
                table.rows[survivor_row][column] =
                    Value::Text(merge_text(&dropped_text, &survivor_text));
            }
        }
        table.rows.remove(dropped_row);
    }
}

fn row_position(table: &Table, pk_column: usize, pk_value: i64) -> Option<usize> {
    table
        .rows
        .iter()
        .position(|row| row[pk_column].as_integer() == Some(pk_value))
}

/// Phase C: drop rows that only differ in a user-chosen ordering or display
/// attribute, once constraint merging has unified structural identity.
pub fn drop_near_duplicates(set: &mut TableSet) {
    for (table_name, ignored) in IGNORED_DEDUP_COLUMNS {
        let Some(table) = set.get_mut(table_name) else {
            continue;
        };
        let Some(column) = table.column_index(ignored) else {
            continue;
        };
        let before = table.len();
        table.dedup_ignoring(column);
        if table.len() < before {
            tracing::debug!(
                table = %table_name,
                ignoring = %ignored,
                dropped = before - table.len(),
                "dropped near-duplicate rows"
            );
        }
    }
}

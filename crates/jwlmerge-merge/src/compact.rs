//! Key compaction.
//!
//! After reconciliation and pruning, surviving keys are scattered across the
//! offset ranges of their sources. Each table with a single integer primary
//! key is renumbered to a dense 1..N sequence in row order, and every
//! foreign key referencing it follows.

use std::collections::HashMap;

use jwlmerge_db::{DbSchema, TableSet};

use crate::dedup::{remap_foreign_keys, remap_primary_key};

/// Renumber every eligible table to dense 1-based keys.
///
/// Tables with composite keys, keyless tables, and single-column tables are
/// left alone.
pub fn compact_keys(set: &mut TableSet, schema: &DbSchema, order: &[String]) {
    for table_name in order {
        let Some(table) = set.get(table_name) else {
            continue;
        };
        if table.columns.len() == 1 {
            continue;
        }
        let Some(pk) = schema.single_primary_key(table_name).map(str::to_string) else {
            continue;
        };
        let Some(pk_column) = table.column_index(&pk) else {
            continue;
        };

        let map: HashMap<i64, i64> = table
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| {
                row[pk_column]
                    .as_integer()
                    .map(|old| (old, (i + 1) as i64))
            })
            .collect();

        tracing::debug!(table = %table_name, keys = map.len(), "compacted primary keys");
        remap_foreign_keys(set, schema, table_name, &pk, &map);
        remap_primary_key(set, table_name, &pk, &map);
    }
}

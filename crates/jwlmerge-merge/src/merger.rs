//! The merge orchestrator.
//!
//! Sequences a full merge run: introspect the first source, load every
//! source with key offsetting, reconcile, garbage-collect, compact, and
//! write the result to `working/merged.db`. Source connections are closed
//! before reconciliation begins; the destination is opened only for the
//! write-back.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use jwlmerge_common::{Error, MergeConfig, Result};
use jwlmerge_db::{
    load_source, open_destination, open_source, write_merged, DbSchema, InsertFailure, TableSet,
};

use crate::catalog::{MEDIA_FILE_COLUMNS, TABLE_PRIORITY};
use crate::{compact, dedup, gc};

/// What a merge run produced.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Path of the merged database.
    pub database: PathBuf,
    /// Rows that failed to insert into the destination.
    pub failures: Vec<InsertFailure>,
    /// File names referenced by the merged media tables, to be bundled into
    /// the output archive.
    pub media_files: Vec<String>,
}

/// Drives a merge run over extracted source databases.
pub struct Merger<'a> {
    config: &'a MergeConfig,
}

impl<'a> Merger<'a> {
    /// Create a merger for one run.
    pub fn new(config: &'a MergeConfig) -> Self {
        Self { config }
    }

    /// Merge the given source databases into the working directory's
    /// `merged.db`. The first source provides the schema and the
    /// destination file.
    pub fn merge(&self, sources: &[PathBuf]) -> Result<MergeOutcome> {
        if sources.len() < 2 {
            return Err(Error::input_missing(
                "at least two source databases are required",
            ));
        }
        fs::create_dir_all(&self.config.working_dir)?;
        let destination = self.config.merged_db_path();
        if destination.exists() {
            fs::remove_file(&destination)?;
        }

        let (schema, mut set) = self.load_sources(sources)?;
        if self.config.debug {
            self.dump_tables(&set, "concat")?;
        }

        let order = set.names_prioritized(TABLE_PRIORITY);

        tracing::info!("collapsing exact duplicates");
        dedup::collapse_exact_duplicates(&mut set, &schema, &order);

        tracing::info!("merging unique-constraint collisions");
        dedup::apply_unique_constraints(&mut set, &schema);

        tracing::info!("pruning orphaned rows");
        gc::prune_empty_untagged_notes(&mut set, &schema);
        gc::prune_orphan_media(&mut set, &schema);
        gc::prune_orphan_block_ranges(&mut set, &schema);
        dedup::drop_near_duplicates(&mut set);
        gc::prune_orphan_locations(&mut set, &schema);

        tracing::info!("compacting primary keys");
        compact::compact_keys(&mut set, &schema, &order);

        let media_files = collect_media_files(&set);
        if self.config.debug {
            self.dump_tables(&set, "merged")?;
        }

        tracing::info!(destination = %destination.display(), "writing merged database");
        fs::copy(&sources[0], &destination)?;
        let mut conn = open_destination(&destination)?;
        let failures = write_merged(&mut conn, &set, &schema)?;
        drop(conn);

        if self.config.debug && !failures.is_empty() {
            self.write_failure_log(&failures)?;
        }

        Ok(MergeOutcome {
            database: destination,
            failures,
            media_files,
        })
    }

    /// Open each source just long enough to read its tables. The first
    /// source also provides the schema.
    fn load_sources(&self, sources: &[PathBuf]) -> Result<(DbSchema, TableSet)> {
        let mut set = TableSet::new();

        tracing::info!(source = %sources[0].display(), "loading source database");
        let first = open_source(&sources[0])?;
        let schema = DbSchema::introspect(&first)?;
        load_source(&first, &schema, &mut set)?;
        drop(first);

        for path in &sources[1..] {
            tracing::info!(source = %path.display(), "loading source database");
            let conn = open_source(path)?;
            load_source(&conn, &schema, &mut set)?;
        }
        Ok((schema, set))
    }

    fn dump_tables(&self, set: &TableSet, prefix: &str) -> Result<()> {
        for table in set.iter() {
            let path = self
                .config
                .working_dir
                .join(format!("{prefix}-{}.json", table.name));
            let json = serde_json::to_string_pretty(&table.to_json())
                .map_err(|e| Error::database(format!("dumping {}: {e}", table.name)))?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    fn write_failure_log(&self, failures: &[InsertFailure]) -> Result<()> {
        let path = self.config.working_dir.join("errors.txt");
        let mut body = String::new();
        for failure in failures {
            body.push_str(&failure.to_string());
            body.push('\n');
        }
        fs::write(&path, body)?;
        tracing::warn!(path = %path.display(), "wrote insertion failure log");
        Ok(())
    }
}

/// Distinct, populated file names from the media-bearing columns.
fn collect_media_files(set: &TableSet) -> Vec<String> {
    let mut files = BTreeSet::new();
    for (table_name, column_name) in MEDIA_FILE_COLUMNS {
        let Some(table) = set.get(table_name) else {
            continue;
        };
        let Some(column) = table.column_index(column_name) else {
            continue;
        };
        for row in &table.rows {
            if let Some(name) = row[column].as_text() {
                if !name.is_empty() {
                    files.insert(name.to_string());
                }
            }
        }
    }
    files.into_iter().collect()
}

//! Jwlmerge-DB: SQLite access for the backup merger.
//!
//! This crate owns everything that touches SQLite directly, plus the
//! in-memory relation model the merge engine operates on:
//!
//! - **Relation Model**: [`Value`], [`Table`], and [`TableSet`] — ordered
//!   rows keyed by column name, with the dedup/remap primitives the merge
//!   engine needs
//! - **Schema Introspection**: [`DbSchema`] — tables, primary keys, foreign
//!   key edges, and captured index/trigger SQL
//! - **Table Loading**: reading each source into the shared [`TableSet`]
//!   with cross-source primary key offsetting
//! - **Persistence**: writing the merged tables back into the destination
//!   database

pub mod connection;
pub mod loader;
pub mod schema;
pub mod table;
pub mod writer;

pub use connection::{open_destination, open_source};
pub use loader::{load_source, offset_floor};
pub use schema::{DbSchema, ForeignKey};
pub use table::{Table, TableSet, Value};
pub use writer::{write_merged, InsertFailure};

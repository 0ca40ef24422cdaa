//! Serde model of a backup archive's `manifest.json`.
//!
//! Only the fields the merger rewrites are modeled explicitly; everything
//! else is preserved through a flattened map so that unknown keys survive the
//! round trip untouched.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, TimeZone};
use chrono_tz::US::Eastern;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The `userDataBackup` block of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataBackup {
    pub last_modified_date: String,
    pub hash: String,
    pub database_name: String,
    pub schema_version: i64,
    pub device_name: String,
}

/// A backup archive manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    pub creation_date: String,
    pub user_data_backup: UserDataBackup,
    /// Fields the merger does not interpret, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Manifest {
    /// Read a manifest from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::manifest(format!("{}: {e}", path.as_ref().display())))
    }

    /// Write the manifest back to disk as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|e| Error::manifest(format!("{}: {e}", path.as_ref().display())))
    }

    /// Name of the database file inside the archive.
    pub fn database_name(&self) -> &str {
        &self.user_data_backup.database_name
    }

    /// Stamp the manifest for a merged archive and return the archive's file
    /// name.
    ///
    /// The creation and last-modified dates are written as US/Eastern offset
    /// timestamps; the archive name embeds the timestamp in the caller's
    /// timezone. All other fields of `userDataBackup` are replaced, with the
    /// schema version carried over from the first source.
    pub fn apply_merge<Tz: TimeZone>(
        &mut self,
        now: DateTime<Tz>,
        database_hash: String,
        app_name: &str,
    ) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let stamp = now
            .with_timezone(&Eastern)
            .format("%Y-%m-%dT%H:%M:%S%z")
            .to_string();
        let archive_name = format!(
            "UserdataBackup_{}_{app_name}.jwlibrary",
            now.format("%Y-%m-%d-%H%M%S")
        );

        self.creation_date = stamp.clone();
        self.name = archive_name.clone();
        self.user_data_backup = UserDataBackup {
            last_modified_date: stamp,
            hash: database_hash,
            database_name: self.user_data_backup.database_name.clone(),
            schema_version: self.user_data_backup.schema_version,
            device_name: app_name.to_string(),
        };

        archive_name
    }
}

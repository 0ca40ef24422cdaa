//! Merge run configuration.
//!
//! All run-wide state (scratch directory, output directory, debug flag, app
//! identifier) lives in an explicit [`MergeConfig`] record constructed once by
//! the CLI and passed down by reference. Nothing in the pipeline reads global
//! state.

use std::path::{Path, PathBuf};

/// Application identifier written into merged manifests as the device name.
pub const APP_NAME: &str = "jwlmerge";

/// Name of the merged database file inside the working directory.
pub const MERGED_DB_NAME: &str = "merged.db";

/// Configuration for a single merge run.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Scratch directory for archive extraction and the merged database.
    pub working_dir: PathBuf,
    /// Directory the final `.jwlibrary` archive is written to.
    pub output_dir: PathBuf,
    /// Retain the scratch directory and emit per-table dumps.
    pub debug: bool,
    /// Identifier recorded in the output manifest.
    pub app_name: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("./working"),
            output_dir: PathBuf::from("./merged"),
            debug: false,
            app_name: APP_NAME.to_string(),
        }
    }
}

impl MergeConfig {
    /// Create a configuration rooted at the given working and output
    /// directories.
    pub fn new<W: AsRef<Path>, O: AsRef<Path>>(working_dir: W, output_dir: O) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Path of the merged database inside the working directory.
    pub fn merged_db_path(&self) -> PathBuf {
        self.working_dir.join(MERGED_DB_NAME)
    }

    /// Staging directory for the output archive's contents.
    pub fn staging_dir(&self) -> PathBuf {
        self.working_dir.join("merged")
    }
}

//! Backup archive handling.
//!
//! A `.jwlibrary` file is a ZIP archive holding one SQLite database, a
//! `manifest.json`, and any media the playlists reference. This module
//! extracts each input into its own scratch directory, stages the output
//! archive's contents, and packs the final archive.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use jwlmerge_common::{Error, Result};

/// Extract one backup archive into its own directory under `working_dir`
/// and return that directory.
///
/// Two inputs may share a file stem; the second gets a numbered directory
/// so their contents stay apart.
pub fn extract_archive(archive_path: &Path, working_dir: &Path) -> Result<PathBuf> {
    let stem = archive_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archive");
    let mut target = working_dir.join(stem);
    let mut suffix = 2;
    while target.exists() {
        target = working_dir.join(format!("{stem}-{suffix}"));
        suffix += 1;
    }
    fs::create_dir_all(&target)?;

    let file = File::open(archive_path)
        .map_err(|e| Error::archive(format!("{}: {e}", archive_path.display())))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| Error::archive(format!("{}: {e}", archive_path.display())))?;
    zip.extract(&target)
        .map_err(|e| Error::archive(format!("{}: {e}", archive_path.display())))?;

    tracing::debug!(archive = %archive_path.display(), into = %target.display(), "extracted archive");
    Ok(target)
}

/// The database file inside an extraction directory.
pub fn find_database(extract_dir: &Path) -> Result<PathBuf> {
    let mut databases: Vec<PathBuf> = fs::read_dir(extract_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("db"))
        })
        .collect();
    databases.sort();
    databases.into_iter().next().ok_or_else(|| {
        Error::archive(format!("no database file in {}", extract_dir.display()))
    })
}

/// Copy the first source's `.png` and `.json` files (the manifest among
/// them) into the staging directory.
pub fn stage_base_files(first_extract_dir: &Path, staging_dir: &Path) -> Result<()> {
    fs::create_dir_all(staging_dir)?;
    for entry in fs::read_dir(first_extract_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let staged = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png") || e.eq_ignore_ascii_case("json"));
        if staged {
            if let Some(name) = path.file_name() {
                fs::copy(&path, staging_dir.join(name))?;
            }
        }
    }
    Ok(())
}

/// Resolve each referenced media file name against the extraction
/// directories and copy it into staging. Names that resolve nowhere are
/// logged and skipped.
pub fn stage_media_files(
    media_files: &[String],
    working_dir: &Path,
    staging_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(staging_dir)?;
    for name in media_files {
        let listed = Path::new(name);
        let resolved = if listed.is_file() {
            Some(listed.to_path_buf())
        } else {
            find_file(working_dir, staging_dir, name)
        };
        match resolved {
            Some(source) => {
                let Some(file_name) = source.file_name() else {
                    continue;
                };
                let destination = staging_dir.join(file_name);
                if source != destination {
                    fs::copy(&source, &destination)?;
                }
            }
            None => tracing::warn!(file = %name, "referenced media file not found in any source"),
        }
    }
    Ok(())
}

/// Recursively search the extraction directories for a file name, skipping
/// the staging directory.
fn find_file(working_dir: &Path, staging_dir: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(working_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.path() != staging_dir)
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name().to_string_lossy() == name)
        .map(|entry| entry.into_path())
}

/// Pack the staging directory's files into a ZIP archive at `output_path`.
pub fn pack_archive(staging_dir: &Path, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(output_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<_> = fs::read_dir(staging_dir)?
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        zip.start_file(name, options)
            .map_err(|e| Error::archive(format!("{}: {e}", output_path.display())))?;
        let mut source = File::open(&path)?;
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish()
        .map_err(|e| Error::archive(format!("{}: {e}", output_path.display())))?;

    tracing::debug!(archive = %output_path.display(), "packed output archive");
    Ok(())
}

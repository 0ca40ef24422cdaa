mod archive;
mod cli;

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use jwlmerge_common::{Manifest, MergeConfig};
use jwlmerge_merge::Merger;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing. Respect RUST_LOG env var; otherwise use defaults
    // based on the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "jwlmerge=trace,jwlmerge_merge=trace,jwlmerge_db=debug".to_string()
        } else {
            "jwlmerge=info,jwlmerge_merge=info".to_string()
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&env_filter))
        .init();

    match run(&cli) {
        Ok(output) => {
            println!();
            println!("Successfully created a backup file containing all merged user data!");
            println!();
            println!("Find it here:\n- {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<PathBuf> {
    let started = Instant::now();
    let config = MergeConfig {
        debug: cli.debug,
        ..MergeConfig::default()
    };

    let archives = gather_archives(cli)?;
    println!(
        "Backup files to be merged:\n{}",
        archives
            .iter()
            .map(|p| format!("- {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n")
    );
    println!();

    fs::create_dir_all(&config.working_dir)?;

    let mut extract_dirs = Vec::with_capacity(archives.len());
    let mut databases = Vec::with_capacity(archives.len());
    for path in &archives {
        let extract_dir = archive::extract_archive(path, &config.working_dir)?;
        databases.push(archive::find_database(&extract_dir)?);
        extract_dirs.push(extract_dir);
    }

    let outcome = Merger::new(&config).merge(&databases)?;
    if !outcome.failures.is_empty() {
        eprintln!(
            "{} rows could not be inserted into the merged database:",
            outcome.failures.len()
        );
        for failure in &outcome.failures {
            eprintln!("- {failure}");
        }
    }

    let staging_dir = config.staging_dir();
    archive::stage_base_files(&extract_dirs[0], &staging_dir)?;
    archive::stage_media_files(&outcome.media_files, &config.working_dir, &staging_dir)?;

    let manifest_path = staging_dir.join("manifest.json");
    let mut manifest = Manifest::load(&manifest_path)
        .context("the first archive must contain a manifest.json")?;

    let staged_database = staging_dir.join(manifest.database_name());
    fs::copy(&outcome.database, &staged_database)?;

    let hash = sha256_hex(&staged_database)?;
    let archive_name = manifest.apply_merge(Local::now(), hash, &config.app_name);
    manifest.save(&manifest_path)?;

    let output_path = config.output_dir.join(&archive_name);
    archive::pack_archive(&staging_dir, &output_path)?;

    if config.debug {
        println!("Debug mode: working directory retained at {}", config.working_dir.display());
    } else {
        fs::remove_dir_all(&config.working_dir)?;
        println!("Cleaned up temporary files!");
    }

    println!();
    println!("Work completed in {:.1} seconds.", started.elapsed().as_secs_f64());

    Ok(std::path::absolute(&output_path).unwrap_or(output_path))
}

/// Collect the archives to merge from `--file` arguments and the `--folder`
/// listing, validating each path up front.
fn gather_archives(cli: &Cli) -> anyhow::Result<Vec<PathBuf>> {
    if let Some(folder) = &cli.folder {
        if !folder.is_dir() {
            bail!("Folder not found: {}\nPlease validate the path.", folder.display());
        }
    }
    for file in &cli.files {
        if !file.is_file() {
            bail!("File not found: {}\nPlease validate the path.", file.display());
        }
    }
    if cli.files.len() == 1 && cli.folder.is_none() {
        bail!("--file cannot be used on its own without another --file or --folder; a file cannot be merged with itself");
    }

    let mut archives = cli.files.clone();
    if let Some(folder) = &cli.folder {
        let mut found: Vec<PathBuf> = fs::read_dir(folder)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("jwlibrary"))
            })
            .collect();
        found.sort();
        archives.extend(found);
    }

    if archives.len() < 2 {
        bail!("Not enough .jwlibrary files found to work with!");
    }
    Ok(archives)
}

fn sha256_hex(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

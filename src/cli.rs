use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jwlmerge")]
#[command(author, version, about = "Merge JW Library backup archives into a single backup")]
pub struct Cli {
    /// Folder containing .jwlibrary files to merge
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// A .jwlibrary file to merge; repeat for each archive
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    /// Retain the working directory and emit per-table dumps
    #[arg(long)]
    pub debug: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

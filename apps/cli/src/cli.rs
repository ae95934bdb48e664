//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser};
use nsplitter_collect::{Mode, normalize_extension};

/// Split large files into fixed-size parts and merge them back.
#[derive(Debug, Parser)]
#[command(name = "nsplitter", version, about)]
#[command(group(ArgGroup::new("mode").required(true).args(["split", "merge"])))]
pub struct Cli {
    /// Split files into `<name>.split.<ext>/` directories.
    #[arg(short, long)]
    pub split: bool,

    /// Merge `<name>.split.<ext>/` directories back into files.
    #[arg(short, long)]
    pub merge: bool,

    /// Directory to search for files or split directories.
    #[arg(short, long, requires = "extension")]
    pub directory: Option<PathBuf>,

    /// File extension to process (e.g. nsp, .mp4).
    #[arg(short, long, value_parser = parse_extension)]
    pub extension: Option<String>,

    /// Search the directory recursively.
    #[arg(short, long, requires = "directory")]
    pub recursive: bool,

    /// Specific files (split) or split directories (merge) to process.
    pub files: Vec<PathBuf>,

    /// Plan and report without writing, renaming or deleting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Delete each source file after it was split.
    #[arg(long)]
    pub clean: bool,

    /// Keep split directories after merging.
    #[arg(long)]
    pub keep_parts: bool,

    /// Write outputs in place instead of staging and renaming.
    #[arg(long)]
    pub in_place: bool,

    /// Maximum part size, in bytes or with a K/M/G suffix (binary units).
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Number of items processed concurrently.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub jobs: Option<u64>,

    /// Configuration file (default: the platform config directory).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.merge { Mode::Merge } else { Mode::Split }
    }
}

fn parse_extension(raw: &str) -> Result<String, String> {
    let ext = normalize_extension(raw.trim());
    if ext.is_empty() {
        return Err("extension must not be empty".into());
    }
    if ext.contains(['/', '\\']) {
        return Err(format!("invalid extension: {raw}"));
    }
    Ok(ext.to_string())
}

/// Parses `4096`, `32K`, `4M`, `4G` (binary multiples, case-insensitive).
pub fn parse_size(raw: &str) -> Result<u64, String> {
    let raw = raw.trim();
    let (digits, multiplier) = match raw.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => {
            let multiplier: u64 = match c.to_ascii_uppercase() {
                'K' => 1 << 10,
                'M' => 1 << 20,
                'G' => 1 << 30,
                _ => return Err(format!("unknown size suffix in {raw:?}")),
            };
            (&raw[..i], multiplier)
        }
        _ => (raw, 1),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size: {raw:?}"))?;
    let size = value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {raw:?}"))?;
    if size == 0 {
        return Err("size must be positive".into());
    }
    Ok(size)
}

//! Directory traversal for split and merge candidates.

use std::path::{Path, PathBuf};

use nsplitter_engine::is_split_name;
use walkdir::WalkDir;

use crate::{CollectError, Mode, has_extension};

/// Collects candidates under `directory`, sorted by path.
///
/// - [`Mode::Split`]: regular files named `*.<extension>` that are not
///   themselves SplitSet names.
/// - [`Mode::Merge`]: SplitSet directories `*.split.<extension>`. Their
///   contents are never descended into.
///
/// Without `recursive` only direct children are considered. Unreadable
/// subdirectories are logged and skipped.
pub fn collect_candidates(
    directory: &Path,
    extension: &str,
    recursive: bool,
    mode: Mode,
) -> Result<Vec<PathBuf>, CollectError> {
    if !directory.is_dir() {
        return Err(CollectError::NotADirectory(directory.display().to_string()));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut walker = WalkDir::new(directory)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter();

    let mut collected = Vec::new();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(CollectError::Walk {
                    path: directory.display().to_string(),
                    source: e,
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let Some(name) = entry.file_name().to_str() else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 name");
            continue;
        };
        let matches_extension = has_extension(name, extension);

        if entry.file_type().is_dir() {
            if is_split_name(name) {
                if mode == Mode::Merge && matches_extension {
                    collected.push(entry.path().to_path_buf());
                }
                walker.skip_current_dir();
            }
            continue;
        }

        if mode == Mode::Split
            && matches_extension
            && !is_split_name(name)
            && entry.path().is_file()
        {
            collected.push(entry.path().to_path_buf());
        }
    }

    collected.sort();
    tracing::debug!(
        directory = %directory.display(),
        ?mode,
        count = collected.len(),
        "collected candidates"
    );
    Ok(collected)
}

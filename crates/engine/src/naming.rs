//! SplitSet and part naming.
//!
//! `name.ext` <-> `name.split.ext`, parts `00`, `01`, ... Everything here is
//! pure except [`is_split_directory`], which stats the path.

use std::path::{Path, PathBuf};

use crate::EngineError;

/// Marker inserted before the extension of a SplitSet directory.
const SPLIT_MARKER: &str = ".split";

/// Minimum number of digits in a part file name.
const PART_NAME_WIDTH: usize = 2;

/// Returns the SplitSet directory name for a file name.
///
/// The extension is everything after the last `.`: `a.tar.gz` becomes
/// `a.tar.split.gz`. Names without a stem or extension are rejected.
pub fn split_dir_name(file_name: &str) -> Result<String, EngineError> {
    let (stem, ext) = file_name
        .rsplit_once('.')
        .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        .ok_or_else(|| {
            EngineError::InvalidInput(format!("file name has no extension: {file_name}"))
        })?;

    if file_name.contains(['/', '\\']) {
        return Err(EngineError::InvalidInput(format!(
            "expected a bare file name: {file_name}"
        )));
    }

    Ok(format!("{stem}{SPLIT_MARKER}.{ext}"))
}

/// Returns the merged file name for a SplitSet directory name.
///
/// Inverse of [`split_dir_name`]: only the marker directly before the
/// extension is removed.
pub fn merged_name(split_name: &str) -> Result<String, EngineError> {
    split_name_parts(split_name)
        .map(|(stem, ext)| format!("{stem}.{ext}"))
        .ok_or_else(|| {
            EngineError::InvalidInput(format!("not a split directory name: {split_name}"))
        })
}

/// Whether `name` matches `<stem>.split.<ext>` with a non-empty stem and a
/// dot-free extension.
pub fn is_split_name(name: &str) -> bool {
    split_name_parts(name).is_some()
}

/// Whether `path` is an existing directory whose name matches the SplitSet
/// pattern. Files never qualify.
pub fn is_split_directory(path: &Path) -> bool {
    let matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_split_name);
    matches && path.is_dir()
}

/// Formats a part ordinal as its file name (`0` -> `00`, `123` -> `123`).
pub fn part_name(ordinal: u64) -> String {
    format!("{ordinal:0width$}", width = PART_NAME_WIDTH)
}

/// Parses a part file name back into its ordinal.
///
/// Only ASCII digits are accepted; signs, whitespace and empty names are
/// rejected.
pub fn parse_part_ordinal(name: &str) -> Result<u64, EngineError> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EngineError::InvalidInput(format!(
            "part name is not an ordinal: {name:?}"
        )));
    }
    name.parse::<u64>()
        .map_err(|e| EngineError::InvalidInput(format!("part ordinal {name:?} out of range: {e}")))
}

/// Returns the SplitSet directory for `source`, next to it in the same
/// parent directory.
pub fn split_dir_path(source: &Path) -> Result<PathBuf, EngineError> {
    let name = utf8_file_name(source)?;
    let dir_name = split_dir_name(name)?;
    Ok(parent_of(source).join(dir_name))
}

/// Returns the merged output path for a SplitSet directory.
pub fn merged_path(split_dir: &Path) -> Result<PathBuf, EngineError> {
    let name = utf8_file_name(split_dir)?;
    let file_name = merged_name(name)?;
    Ok(parent_of(split_dir).join(file_name))
}

/// Splits `<stem>.split.<ext>` into `(stem, ext)`.
fn split_name_parts(name: &str) -> Option<(&str, &str)> {
    let (head, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || name.contains(['/', '\\']) {
        return None;
    }
    let stem = head.strip_suffix(SPLIT_MARKER)?;
    if stem.is_empty() {
        return None;
    }
    Some((stem, ext))
}

fn utf8_file_name(path: &Path) -> Result<&str, EngineError> {
    path.file_name()
        .ok_or_else(|| {
            EngineError::InvalidInput(format!("path has no file name: {}", path.display()))
        })?
        .to_str()
        .ok_or_else(|| {
            EngineError::InvalidInput(format!("file name is not valid UTF-8: {}", path.display()))
        })
}

fn parent_of(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

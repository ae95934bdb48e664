//! Finding what to split or merge, and deciding whether it should be.
//!
//! Discovery walks a directory for candidates; pre-flight validates each
//! candidate (extension, size gate, free space) before the engine runs.

mod discover;
mod preflight;

pub use discover::collect_candidates;
pub use preflight::{FsSpaceProbe, Preflight, Rejection, SpaceProbe};

use serde::Serialize;

/// Whether a run splits files or merges SplitSets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Split,
    Merge,
}

/// Errors produced while walking a directory.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
}

/// Strips a leading `.` so `.mp4` and `mp4` mean the same filter.
pub fn normalize_extension(extension: &str) -> &str {
    extension.strip_prefix('.').unwrap_or(extension)
}

/// Whether `name` is `<something>.<extension>` with a non-empty stem.
pub(crate) fn has_extension(name: &str, extension: &str) -> bool {
    let extension = normalize_extension(extension);
    name.strip_suffix(extension)
        .and_then(|head| head.strip_suffix('.'))
        .is_some_and(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_extension_strips_one_dot() {
        assert_eq!(normalize_extension(".mp4"), "mp4");
        assert_eq!(normalize_extension("nsp"), "nsp");
        assert_eq!(normalize_extension(""), "");
    }

    #[test]
    fn has_extension_needs_a_stem() {
        assert!(has_extension("movie.mp4", "mp4"));
        assert!(has_extension("movie.mp4", ".mp4"));
        assert!(has_extension("archive.tar.gz", "tar.gz"));
        assert!(!has_extension(".mp4", "mp4"));
        assert!(!has_extension("movie.mp4", "p4"));
        assert!(!has_extension("moviemp4", "mp4"));
        assert!(!has_extension("movie.MP4", "mp4"));
    }
}

//! Pre-flight validation of split and merge candidates.

use std::path::{Path, PathBuf};

use nsplitter_engine::{EngineError, is_split_name};

use crate::{has_extension, normalize_extension};

/// Reports free space on the filesystem holding a path.
pub trait SpaceProbe: Send + Sync {
    fn available_space(&self, path: &Path) -> std::io::Result<u64>;
}

/// Queries the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSpaceProbe;

impl SpaceProbe for FsSpaceProbe {
    fn available_space(&self, path: &Path) -> std::io::Result<u64> {
        fs2::available_space(path)
    }
}

/// Why a candidate is skipped.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("not a split directory: {}", .0.display())]
    NotASplitDirectory(PathBuf),

    #[error("extension mismatch (expected .{expected}): {}", path.display())]
    ExtensionMismatch { path: PathBuf, expected: String },

    #[error("{size} bytes is at or below the {threshold} byte split threshold: {}", path.display())]
    BelowThreshold {
        path: PathBuf,
        size: u64,
        threshold: u64,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Validates candidates before the engine touches them.
pub struct Preflight<P: SpaceProbe = FsSpaceProbe> {
    min_split_size: u64,
    extension: Option<String>,
    probe: P,
}

impl<P: SpaceProbe> Preflight<P> {
    /// Files at or below `min_split_size` bytes are not split. When
    /// `extension` is set, candidates must carry it.
    pub fn new(min_split_size: u64, extension: Option<&str>, probe: P) -> Self {
        Self {
            min_split_size,
            extension: extension.map(|e| normalize_extension(e).to_string()),
            probe,
        }
    }

    /// Checks a file before splitting and returns its size.
    pub fn check_split(&self, path: &Path) -> Result<u64, Rejection> {
        let metadata = std::fs::metadata(path).map_err(|e| EngineError::io(path, e))?;
        if !metadata.is_file() {
            return Err(Rejection::NotAFile(path.to_path_buf()));
        }
        self.check_extension(path)?;

        let size = metadata.len();
        if size <= self.min_split_size {
            return Err(Rejection::BelowThreshold {
                path: path.to_path_buf(),
                size,
                threshold: self.min_split_size,
            });
        }

        self.check_free_space(path, size)?;
        Ok(size)
    }

    /// Checks a SplitSet before merging and returns the merged size.
    pub fn check_merge(&self, path: &Path) -> Result<u64, Rejection> {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !is_split_name(name) {
            return Err(Rejection::NotASplitDirectory(path.to_path_buf()));
        }
        let metadata = std::fs::metadata(path).map_err(|e| EngineError::io(path, e))?;
        if !metadata.is_dir() {
            return Err(Rejection::NotASplitDirectory(path.to_path_buf()));
        }
        self.check_extension(path)?;

        let size = parts_size(path)?;
        self.check_free_space(path, size)?;
        Ok(size)
    }

    /// Fails with [`EngineError::InsufficientSpace`] when the filesystem
    /// holding `path` has less than `required` bytes free.
    pub fn check_free_space(&self, path: &Path, required: u64) -> Result<(), EngineError> {
        let target = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let available = self
            .probe
            .available_space(target)
            .map_err(|e| EngineError::io(target, e))?;

        if required > available {
            return Err(EngineError::InsufficientSpace {
                path: path.to_path_buf(),
                required,
                available,
            });
        }
        Ok(())
    }

    fn check_extension(&self, path: &Path) -> Result<(), Rejection> {
        let Some(expected) = &self.extension else {
            return Ok(());
        };
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if has_extension(name, expected) {
            Ok(())
        } else {
            Err(Rejection::ExtensionMismatch {
                path: path.to_path_buf(),
                expected: expected.clone(),
            })
        }
    }
}

/// Total size of the regular files directly inside `dir`.
fn parts_size(dir: &Path) -> Result<u64, EngineError> {
    let entries = std::fs::read_dir(dir).map_err(|e| EngineError::io(dir, e))?;
    let mut total = 0u64;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(dir, e))?;
        let metadata = entry.metadata().map_err(|e| EngineError::io(entry.path(), e))?;
        if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedProbe(u64);

    impl SpaceProbe for FixedProbe {
        fn available_space(&self, _path: &Path) -> std::io::Result<u64> {
            Ok(self.0)
        }
    }

    struct FailingProbe;

    impl SpaceProbe for FailingProbe {
        fn available_space(&self, _path: &Path) -> std::io::Result<u64> {
            Err(std::io::Error::other("statvfs failed"))
        }
    }

    fn file_of(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, vec![7u8; len]).unwrap();
        path
    }

    #[test]
    fn split_accepts_large_file_with_space() {
        let tmp = TempDir::new().unwrap();
        let path = file_of(tmp.path(), "big.nsp", 100);

        let preflight = Preflight::new(50, Some("nsp"), FixedProbe(1000));
        assert_eq!(preflight.check_split(&path).unwrap(), 100);
    }

    #[test]
    fn split_skips_at_threshold() {
        let tmp = TempDir::new().unwrap();
        let path = file_of(tmp.path(), "edge.nsp", 50);

        let preflight = Preflight::new(50, None, FixedProbe(u64::MAX));
        let err = preflight.check_split(&path).unwrap_err();
        assert!(matches!(err, Rejection::BelowThreshold { size: 50, threshold: 50, .. }));
    }

    #[test]
    fn split_rejects_extension_mismatch() {
        let tmp = TempDir::new().unwrap();
        let path = file_of(tmp.path(), "clip.mkv", 100);

        let preflight = Preflight::new(0, Some(".mp4"), FixedProbe(u64::MAX));
        let err = preflight.check_split(&path).unwrap_err();
        assert!(matches!(
            err,
            Rejection::ExtensionMismatch { ref expected, .. } if expected == "mp4"
        ));
    }

    #[test]
    fn split_reports_insufficient_space() {
        let tmp = TempDir::new().unwrap();
        let path = file_of(tmp.path(), "big.iso", 100);

        let preflight = Preflight::new(10, None, FixedProbe(99));
        let err = preflight.check_split(&path).unwrap_err();
        assert!(matches!(
            err,
            Rejection::Engine(EngineError::InsufficientSpace {
                required: 100,
                available: 99,
                ..
            })
        ));
    }

    #[test]
    fn split_probe_failure_is_io() {
        let tmp = TempDir::new().unwrap();
        let path = file_of(tmp.path(), "big.iso", 100);

        let preflight = Preflight::new(10, None, FailingProbe);
        let err = preflight.check_split(&path).unwrap_err();
        assert!(matches!(err, Rejection::Engine(EngineError::Io { .. })));
    }

    #[test]
    fn split_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let preflight = Preflight::new(0, None, FixedProbe(u64::MAX));
        let err = preflight.check_split(&tmp.path().join("gone.bin")).unwrap_err();
        assert!(matches!(err, Rejection::Engine(EngineError::NotFound(_))));
    }

    #[test]
    fn split_rejects_directory() {
        let tmp = TempDir::new().unwrap();
        let preflight = Preflight::new(0, None, FixedProbe(u64::MAX));
        let err = preflight.check_split(tmp.path()).unwrap_err();
        assert!(matches!(err, Rejection::NotAFile(_)));
    }

    #[test]
    fn merge_sums_parts() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("game.split.nsp");
        std::fs::create_dir(&dir).unwrap();
        file_of(&dir, "00", 40);
        file_of(&dir, "01", 2);

        let preflight = Preflight::new(u64::MAX, Some("nsp"), FixedProbe(42));
        assert_eq!(preflight.check_merge(&dir).unwrap(), 42);

        let tight = Preflight::new(0, None, FixedProbe(41));
        assert!(matches!(
            tight.check_merge(&dir).unwrap_err(),
            Rejection::Engine(EngineError::InsufficientSpace { .. })
        ));
    }

    #[test]
    fn merge_rejects_plain_directory_and_files() {
        let tmp = TempDir::new().unwrap();
        let plain = tmp.path().join("games");
        std::fs::create_dir(&plain).unwrap();
        let file = file_of(tmp.path(), "x.split.bin", 3);

        let preflight = Preflight::new(0, None, FixedProbe(u64::MAX));
        assert!(matches!(
            preflight.check_merge(&plain).unwrap_err(),
            Rejection::NotASplitDirectory(_)
        ));
        assert!(matches!(
            preflight.check_merge(&file).unwrap_err(),
            Rejection::NotASplitDirectory(_)
        ));
    }

    #[test]
    fn merge_rejects_extension_mismatch() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("movie.split.mp4");
        std::fs::create_dir(&dir).unwrap();

        let preflight = Preflight::new(0, Some("nsp"), FixedProbe(u64::MAX));
        assert!(matches!(
            preflight.check_merge(&dir).unwrap_err(),
            Rejection::ExtensionMismatch { .. }
        ));
    }

    #[test]
    fn fs_probe_reports_space() {
        let tmp = TempDir::new().unwrap();
        let available = FsSpaceProbe.available_space(tmp.path()).unwrap();
        assert!(available > 0);
    }
}

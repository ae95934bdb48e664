//! Split/merge engine for chunked file archiving.
//!
//! A source file `name.ext` is split into a sibling directory
//! `name.split.ext/` holding parts `00`, `01`, ... of at most
//! `max_chunk_size` bytes each. Merging concatenates the parts in numeric
//! order back into `name.ext`, byte-for-byte.

mod merge;
mod naming;
mod progress;
mod split;

use std::path::PathBuf;

pub use merge::{MergeOptions, MergeReport, Merger};
pub use naming::{
    is_split_directory, is_split_name, merged_name, merged_path, parse_part_ordinal, part_name,
    split_dir_name, split_dir_path,
};
pub use progress::{
    NullSink, Operation, ProgressEvent, ProgressSink, TickThrottle, TracingSink, format_elapsed,
};
pub use split::{PartPlan, SplitOptions, SplitReport, Splitter};

/// Default maximum part size: 4 GiB minus 64 KiB.
///
/// Kept just under the 4 GiB boundary so parts fit on FAT32 volumes.
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 0xFFFF_0000;

/// Default read buffer while splitting: 32 KiB.
pub const DEFAULT_SPLIT_BUFFER_SIZE: usize = 32 * 1024;

/// Default read buffer while merging: 4 MiB.
pub const DEFAULT_MERGE_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Suffix of staging paths used by atomic split/merge.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Errors produced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "insufficient space for {}: need {required} bytes, {available} available",
        path.display()
    )]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },
}

impl EngineError {
    /// Wraps an I/O error with the path it happened on.
    ///
    /// `NotFound` I/O errors become [`EngineError::NotFound`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return EngineError::NotFound(path);
        }
        EngineError::Io { path, source }
    }
}

//! Merging a SplitSet back into the original file.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::naming::{merged_path, parse_part_ordinal};
use crate::progress::{Operation, ProgressEvent, ProgressSink, TickThrottle};
use crate::split::staging_path;
use crate::{DEFAULT_MERGE_BUFFER_SIZE, EngineError};

/// Options for [`Merger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Copy buffer size in bytes.
    pub buffer_size: usize,
    /// Validate and plan only: nothing is written or removed.
    pub dry_run: bool,
    /// Recursively delete the SplitSet after a successful merge.
    pub remove_split_dir: bool,
    /// Write to `<merged>.partial` and rename over the target on success.
    pub atomic: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_MERGE_BUFFER_SIZE,
            dry_run: false,
            remove_split_dir: true,
            atomic: true,
        }
    }
}

/// Outcome of a merge.
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub split_dir: PathBuf,
    pub merged_path: PathBuf,
    /// Size of each part, in ordinal order.
    pub part_sizes: Vec<u64>,
    pub total_bytes: u64,
    pub split_dir_removed: bool,
    pub dry_run: bool,
    pub elapsed: Duration,
}

/// A part found in a SplitSet.
#[derive(Debug, Clone)]
struct Part {
    ordinal: u64,
    path: PathBuf,
    size: u64,
}

/// Concatenates SplitSet parts in numeric order.
#[derive(Debug, Clone)]
pub struct Merger {
    options: MergeOptions,
}

impl Merger {
    /// Creates a merger, rejecting a zero buffer size.
    pub fn new(options: MergeOptions) -> Result<Self, EngineError> {
        if options.buffer_size == 0 {
            return Err(EngineError::InvalidInput("buffer size must be positive".into()));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merges the parts in `split_dir` into the file next to it.
    ///
    /// A name that does not match `<stem>.split.<ext>` is rejected before
    /// any I/O. An existing output file is overwritten.
    pub fn merge(
        &self,
        split_dir: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<MergeReport, EngineError> {
        let merged = merged_path(split_dir)?;

        let metadata = std::fs::metadata(split_dir).map_err(|e| EngineError::io(split_dir, e))?;
        if !metadata.is_dir() {
            return Err(EngineError::InvalidInput(format!(
                "not a directory: {}",
                split_dir.display()
            )));
        }

        let parts = list_parts(split_dir)?;
        let part_sizes: Vec<u64> = parts.iter().map(|p| p.size).collect();
        let total_bytes: u64 = part_sizes.iter().sum();
        let dry_run = self.options.dry_run;
        let start = Instant::now();

        sink.on_event(&ProgressEvent::Started {
            op: Operation::Merge,
            path: split_dir,
            total_bytes,
            total_parts: parts.len() as u64,
            dry_run,
        });

        let total_bytes = if dry_run {
            report_planned_parts(&parts, total_bytes, start, sink);
            total_bytes
        } else {
            self.write_merged(&parts, &merged, total_bytes, start, sink)?
        };

        let split_dir_removed = !dry_run && self.options.remove_split_dir;
        if split_dir_removed {
            std::fs::remove_dir_all(split_dir).map_err(|e| EngineError::io(split_dir, e))?;
        }

        let elapsed = start.elapsed();
        sink.on_event(&ProgressEvent::Finished {
            op: Operation::Merge,
            output: &merged,
            total_bytes,
            elapsed,
        });
        tracing::info!(
            split_dir = %split_dir.display(),
            merged = %merged.display(),
            parts = parts.len(),
            total_bytes,
            dry_run,
            "merge complete"
        );

        Ok(MergeReport {
            split_dir: split_dir.to_path_buf(),
            merged_path: merged,
            part_sizes,
            total_bytes,
            split_dir_removed,
            dry_run,
            elapsed,
        })
    }

    /// Streams every part into the output and returns the bytes written.
    fn write_merged(
        &self,
        parts: &[Part],
        merged: &Path,
        expected_bytes: u64,
        start: Instant,
        sink: &dyn ProgressSink,
    ) -> Result<u64, EngineError> {
        let out_path = if self.options.atomic {
            staging_path(merged)
        } else {
            merged.to_path_buf()
        };

        let mut output = File::create(&out_path).map_err(|e| EngineError::io(&out_path, e))?;
        let mut buf = vec![0u8; self.options.buffer_size];
        let total_parts = parts.len() as u64;
        let mut bytes_done = 0u64;

        for part in parts {
            let mut input = File::open(&part.path).map_err(|e| EngineError::io(&part.path, e))?;
            let mut throttle = TickThrottle::new();
            let mut part_bytes = 0u64;

            loop {
                let n = match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(EngineError::io(&part.path, e)),
                };
                output
                    .write_all(&buf[..n])
                    .map_err(|e| EngineError::io(&out_path, e))?;
                part_bytes += n as u64;
                bytes_done += n as u64;

                let elapsed = start.elapsed();
                if throttle.should_tick(elapsed) {
                    sink.on_event(&ProgressEvent::Tick {
                        op: Operation::Merge,
                        part: part.ordinal,
                        total_parts,
                        bytes_done,
                        total_bytes: expected_bytes,
                        elapsed,
                    });
                }
            }

            tracing::debug!(part = %part.path.display(), bytes = part_bytes, "part merged");
            sink.on_event(&ProgressEvent::PartFinished {
                op: Operation::Merge,
                part: part.ordinal,
                total_parts,
                part_bytes,
                bytes_done,
                total_bytes: expected_bytes,
                elapsed: start.elapsed(),
            });
        }

        if out_path != merged {
            output.sync_all().map_err(|e| EngineError::io(&out_path, e))?;
            drop(output);
            std::fs::rename(&out_path, merged).map_err(|e| EngineError::io(merged, e))?;
        }

        Ok(bytes_done)
    }
}

/// Lists and orders the parts of a SplitSet.
///
/// Every entry must be a regular file named by an ordinal, and the ordinals
/// must run `0, 1, ..., n-1` without gaps or duplicates (`1` and `01`).
fn list_parts(split_dir: &Path) -> Result<Vec<Part>, EngineError> {
    let entries = std::fs::read_dir(split_dir).map_err(|e| EngineError::io(split_dir, e))?;

    let mut parts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(split_dir, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_str().ok_or_else(|| {
            EngineError::InvalidInput(format!("part name is not valid UTF-8: {}", path.display()))
        })?;
        let ordinal = parse_part_ordinal(name)?;

        let metadata = entry.metadata().map_err(|e| EngineError::io(&path, e))?;
        if !metadata.is_file() {
            return Err(EngineError::InvalidInput(format!(
                "part is not a regular file: {}",
                path.display()
            )));
        }

        parts.push(Part {
            ordinal,
            path,
            size: metadata.len(),
        });
    }

    parts.sort_by_key(|p| p.ordinal);

    for (expected, part) in (0u64..).zip(&parts) {
        if part.ordinal != expected {
            let reason = if expected > 0 && part.ordinal == expected - 1 {
                format!("duplicate part {}", part.ordinal)
            } else {
                format!("missing part {expected}")
            };
            return Err(EngineError::InvalidInput(format!(
                "{reason} in {}",
                split_dir.display()
            )));
        }
    }

    Ok(parts)
}

fn report_planned_parts(parts: &[Part], total_bytes: u64, start: Instant, sink: &dyn ProgressSink) {
    let total_parts = parts.len() as u64;
    let mut bytes_done = 0u64;
    for part in parts {
        bytes_done += part.size;
        sink.on_event(&ProgressEvent::PartFinished {
            op: Operation::Merge,
            part: part.ordinal,
            total_parts,
            part_bytes: part.size,
            bytes_done,
            total_bytes,
            elapsed: start.elapsed(),
        });
    }
}

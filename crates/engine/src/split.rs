//! Splitting a file into fixed-size parts.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::naming::{part_name, split_dir_path};
use crate::progress::{Operation, ProgressEvent, ProgressSink, TickThrottle};
use crate::{DEFAULT_MAX_CHUNK_SIZE, DEFAULT_SPLIT_BUFFER_SIZE, EngineError, PARTIAL_SUFFIX};

/// Options for [`Splitter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    /// Maximum size of each part in bytes. Must be positive.
    pub max_chunk_size: u64,
    /// Read buffer size in bytes. Independent of the chunk size.
    pub buffer_size: usize,
    /// Plan only: no directories or parts are written, nothing is removed.
    pub dry_run: bool,
    /// Delete the source file after a successful split.
    pub remove_source: bool,
    /// Write into a staging directory and rename it into place on success.
    pub atomic: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            buffer_size: DEFAULT_SPLIT_BUFFER_SIZE,
            dry_run: false,
            remove_source: false,
            atomic: true,
        }
    }
}

/// Outcome of a split.
#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    pub source: PathBuf,
    pub split_dir: PathBuf,
    pub plan: PartPlan,
    pub total_bytes: u64,
    pub source_removed: bool,
    pub dry_run: bool,
    pub elapsed: Duration,
}

/// How a file is cut into parts.
///
/// Always `ceil(total / max_chunk_size)` parts; every part but the last is
/// full, and an evenly divisible size never produces a trailing empty part.
/// Part sizes are derived on demand, so a plan stays the same size however
/// many parts it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartPlan {
    pub max_chunk_size: u64,
    pub part_count: u64,
    /// Size of the final part; `0` only when there are no parts.
    pub last_part_size: u64,
}

impl PartPlan {
    /// Plans the parts for a file of `total` bytes.
    pub fn new(total: u64, max_chunk_size: u64) -> Result<Self, EngineError> {
        if max_chunk_size == 0 {
            return Err(EngineError::InvalidInput(
                "max chunk size must be positive".into(),
            ));
        }
        let part_count = total.div_ceil(max_chunk_size);
        let last_part_size = match part_count {
            0 => 0,
            n => total - max_chunk_size * (n - 1),
        };
        Ok(Self {
            max_chunk_size,
            part_count,
            last_part_size,
        })
    }

    /// Total bytes covered by the plan.
    pub fn total_bytes(&self) -> u64 {
        match self.part_count {
            0 => 0,
            n => self.max_chunk_size * (n - 1) + self.last_part_size,
        }
    }

    /// Size of part `part`, or `0` past the end.
    pub fn part_size(&self, part: u64) -> u64 {
        if part >= self.part_count {
            0
        } else if part == self.part_count - 1 {
            self.last_part_size
        } else {
            self.max_chunk_size
        }
    }

    /// Part sizes in ordinal order.
    pub fn sizes(self) -> impl Iterator<Item = u64> {
        (0..self.part_count).map(move |part| self.part_size(part))
    }
}

/// Splits files into a `name.split.ext` directory of numbered parts.
#[derive(Debug, Clone)]
pub struct Splitter {
    options: SplitOptions,
}

impl Splitter {
    /// Creates a splitter, rejecting a zero chunk or buffer size.
    pub fn new(options: SplitOptions) -> Result<Self, EngineError> {
        if options.max_chunk_size == 0 {
            return Err(EngineError::InvalidInput(
                "max chunk size must be positive".into(),
            ));
        }
        if options.buffer_size == 0 {
            return Err(EngineError::InvalidInput("buffer size must be positive".into()));
        }
        Ok(Self { options })
    }

    pub fn options(&self) -> &SplitOptions {
        &self.options
    }

    /// Splits `source` into parts and returns where they were written.
    ///
    /// On a mid-stream failure the partially written parts are left on disk.
    pub fn split(
        &self,
        source: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<SplitReport, EngineError> {
        let split_dir = split_dir_path(source)?;

        let metadata = std::fs::metadata(source).map_err(|e| EngineError::io(source, e))?;
        if !metadata.is_file() {
            return Err(EngineError::InvalidInput(format!(
                "not a regular file: {}",
                source.display()
            )));
        }
        check_target(&split_dir)?;

        let mut input = File::open(source).map_err(|e| EngineError::io(source, e))?;
        let total_bytes = input
            .metadata()
            .map_err(|e| EngineError::io(source, e))?
            .len();
        let plan = PartPlan::new(total_bytes, self.options.max_chunk_size)?;
        let dry_run = self.options.dry_run;
        let start = Instant::now();

        sink.on_event(&ProgressEvent::Started {
            op: Operation::Split,
            path: source,
            total_bytes,
            total_parts: plan.part_count,
            dry_run,
        });

        if dry_run {
            report_planned_parts(plan, start, sink);
        } else {
            let work_dir = self.work_dir(&split_dir)?;
            self.write_parts(&mut input, source, &work_dir, plan, start, sink)?;
            drop(input);
            if work_dir != split_dir {
                commit_dir(&work_dir, &split_dir)?;
            }
        }

        let source_removed = !dry_run && self.options.remove_source;
        if source_removed {
            std::fs::remove_file(source).map_err(|e| EngineError::io(source, e))?;
        }

        let elapsed = start.elapsed();
        sink.on_event(&ProgressEvent::Finished {
            op: Operation::Split,
            output: &split_dir,
            total_bytes,
            elapsed,
        });
        tracing::info!(
            source = %source.display(),
            split_dir = %split_dir.display(),
            parts = plan.part_count,
            total_bytes,
            dry_run,
            "split complete"
        );

        Ok(SplitReport {
            source: source.to_path_buf(),
            split_dir,
            plan,
            total_bytes,
            source_removed,
            dry_run,
            elapsed,
        })
    }

    /// Creates the directory parts are written into.
    fn work_dir(&self, split_dir: &Path) -> Result<PathBuf, EngineError> {
        if !self.options.atomic {
            std::fs::create_dir_all(split_dir).map_err(|e| EngineError::io(split_dir, e))?;
            return Ok(split_dir.to_path_buf());
        }

        let staging = staging_path(split_dir);
        if staging.exists() {
            tracing::warn!(path = %staging.display(), "removing stale staging directory");
            std::fs::remove_dir_all(&staging).map_err(|e| EngineError::io(&staging, e))?;
        }
        std::fs::create_dir_all(&staging).map_err(|e| EngineError::io(&staging, e))?;
        Ok(staging)
    }

    fn write_parts(
        &self,
        input: &mut File,
        source: &Path,
        work_dir: &Path,
        plan: PartPlan,
        start: Instant,
        sink: &dyn ProgressSink,
    ) -> Result<(), EngineError> {
        let mut buf = vec![0u8; self.options.buffer_size];
        let total_bytes = plan.total_bytes();
        let total_parts = plan.part_count;
        let mut bytes_done = 0u64;

        for part in 0..total_parts {
            let size = plan.part_size(part);
            let part_path = work_dir.join(part_name(part));
            let mut output = File::create(&part_path).map_err(|e| EngineError::io(&part_path, e))?;
            let mut throttle = TickThrottle::new();
            let mut remaining = size;

            while remaining > 0 {
                let want = remaining.min(buf.len() as u64) as usize;
                let n = match input.read(&mut buf[..want]) {
                    Ok(0) => {
                        let err = std::io::Error::new(
                            ErrorKind::UnexpectedEof,
                            format!("source ended {} bytes early", total_bytes - bytes_done),
                        );
                        return Err(EngineError::io(source, err));
                    }
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(EngineError::io(source, e)),
                };
                output
                    .write_all(&buf[..n])
                    .map_err(|e| EngineError::io(&part_path, e))?;
                remaining -= n as u64;
                bytes_done += n as u64;

                let elapsed = start.elapsed();
                if throttle.should_tick(elapsed) {
                    sink.on_event(&ProgressEvent::Tick {
                        op: Operation::Split,
                        part,
                        total_parts,
                        bytes_done,
                        total_bytes,
                        elapsed,
                    });
                }
            }

            if self.options.atomic {
                output.sync_all().map_err(|e| EngineError::io(&part_path, e))?;
            }
            drop(output);

            tracing::debug!(part = %part_path.display(), bytes = size, "part written");
            sink.on_event(&ProgressEvent::PartFinished {
                op: Operation::Split,
                part,
                total_parts,
                part_bytes: size,
                bytes_done,
                total_bytes,
                elapsed: start.elapsed(),
            });
        }

        Ok(())
    }
}

/// Emits the part events a real split would, without touching the disk.
fn report_planned_parts(plan: PartPlan, start: Instant, sink: &dyn ProgressSink) {
    let total_bytes = plan.total_bytes();
    let total_parts = plan.part_count;
    let mut bytes_done = 0u64;
    for part in 0..total_parts {
        let size = plan.part_size(part);
        bytes_done += size;
        sink.on_event(&ProgressEvent::PartFinished {
            op: Operation::Split,
            part,
            total_parts,
            part_bytes: size,
            bytes_done,
            total_bytes,
            elapsed: start.elapsed(),
        });
    }
}

/// The SplitSet may be absent or an empty directory; anything else would
/// mix new parts with old ones.
fn check_target(split_dir: &Path) -> Result<(), EngineError> {
    let metadata = match std::fs::symlink_metadata(split_dir) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(EngineError::io(split_dir, e)),
    };
    if !metadata.is_dir() {
        return Err(EngineError::InvalidInput(format!(
            "{} exists and is not a directory",
            split_dir.display()
        )));
    }
    let mut entries = std::fs::read_dir(split_dir).map_err(|e| EngineError::io(split_dir, e))?;
    if entries.next().is_some() {
        return Err(EngineError::InvalidInput(format!(
            "{} already exists and is not empty",
            split_dir.display()
        )));
    }
    Ok(())
}

/// Renames the finished staging directory over the (absent or empty) target.
fn commit_dir(staging: &Path, split_dir: &Path) -> Result<(), EngineError> {
    if split_dir.is_dir() {
        std::fs::remove_dir(split_dir).map_err(|e| EngineError::io(split_dir, e))?;
    }
    std::fs::rename(staging, split_dir).map_err(|e| EngineError::io(split_dir, e))
}

pub(crate) fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

//! Progress reporting side channel.
//!
//! The engine never prints. It emits [`ProgressEvent`]s into a
//! [`ProgressSink`] supplied by the caller.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

/// Which engine operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Split,
    Merge,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Split => f.write_str("split"),
            Operation::Merge => f.write_str("merge"),
        }
    }
}

/// A progress notification. Part numbers are zero-based ordinals.
#[derive(Debug, Clone)]
pub enum ProgressEvent<'a> {
    Started {
        op: Operation,
        path: &'a Path,
        total_bytes: u64,
        total_parts: u64,
        dry_run: bool,
    },
    /// Emitted while a part is being copied, at most once per elapsed second.
    Tick {
        op: Operation,
        part: u64,
        total_parts: u64,
        bytes_done: u64,
        total_bytes: u64,
        elapsed: Duration,
    },
    PartFinished {
        op: Operation,
        part: u64,
        total_parts: u64,
        part_bytes: u64,
        bytes_done: u64,
        total_bytes: u64,
        elapsed: Duration,
    },
    Finished {
        op: Operation,
        output: &'a Path,
        total_bytes: u64,
        elapsed: Duration,
    },
}

impl ProgressEvent<'_> {
    /// Completed fraction in `0.0..=1.0`. An empty job counts as complete.
    pub fn fraction(&self) -> f64 {
        match self {
            ProgressEvent::Started { .. } => 0.0,
            ProgressEvent::Finished { .. } => 1.0,
            ProgressEvent::Tick {
                bytes_done,
                total_bytes,
                ..
            }
            | ProgressEvent::PartFinished {
                bytes_done,
                total_bytes,
                ..
            } => {
                if *total_bytes == 0 {
                    1.0
                } else {
                    *bytes_done as f64 / *total_bytes as f64
                }
            }
        }
    }
}

/// Receives progress events from the engine.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_event(&self, _event: &ProgressEvent<'_>) {}
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::Started {
                op,
                path,
                total_bytes,
                total_parts,
                dry_run,
            } => {
                tracing::debug!(
                    %op,
                    path = %path.display(),
                    total_bytes,
                    total_parts,
                    dry_run,
                    "started"
                );
            }
            ProgressEvent::Tick { .. } => {}
            ProgressEvent::PartFinished {
                op,
                part,
                total_parts,
                part_bytes,
                bytes_done,
                ..
            } => {
                tracing::debug!(%op, part, total_parts, part_bytes, bytes_done, "part finished");
            }
            ProgressEvent::Finished {
                op,
                output,
                total_bytes,
                elapsed,
            } => {
                tracing::debug!(
                    %op,
                    output = %output.display(),
                    total_bytes,
                    elapsed = %format_elapsed(*elapsed),
                    "finished"
                );
            }
        }
    }
}

/// Limits tick events to one per whole elapsed second.
#[derive(Debug, Default)]
pub struct TickThrottle {
    last_second: Option<u64>,
}

impl TickThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time it sees each whole second of `elapsed`.
    pub fn should_tick(&mut self, elapsed: Duration) -> bool {
        let second = elapsed.as_secs();
        if self.last_second == Some(second) {
            return false;
        }
        self.last_second = Some(second);
        true
    }
}

/// Formats a duration as `HH:MM:SS`. Hours are not capped at 24.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, rest) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

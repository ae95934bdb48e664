//! Run dispatcher: gathers targets, validates them and drives the engine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use nsplitter_collect::{FsSpaceProbe, Mode, Preflight, Rejection, SpaceProbe, collect_candidates};
use nsplitter_engine::{EngineError, MergeReport, Merger, ProgressSink, SplitReport, Splitter};
use rayon::prelude::*;
use serde::Serialize;

use crate::cli::Cli;
use crate::config::Config;

/// What happened to a single target.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ItemOutcome {
    Split(SplitReport),
    Merged(MergeReport),
    Skipped { path: PathBuf, reason: String },
    Failed { path: PathBuf, error: String },
}

/// Result of a whole run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub dry_run: bool,
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub items: Vec<ItemOutcome>,
}

/// Processes every target named on the command line.
pub fn run(cli: &Cli, config: &Config, sink: &dyn ProgressSink) -> anyhow::Result<RunSummary> {
    run_with_probe(cli, config, FsSpaceProbe, sink)
}

fn run_with_probe<P: SpaceProbe>(
    cli: &Cli,
    config: &Config,
    probe: P,
    sink: &dyn ProgressSink,
) -> anyhow::Result<RunSummary> {
    let started = Instant::now();
    let mode = cli.mode();

    let (targets, mut items) = gather_targets(cli, mode);
    let targets = dedup_targets(targets);
    tracing::info!(mode = mode_name(mode), count = targets.len(), "targets gathered");

    // With `-d`, the extension filter covers explicit paths as well as the
    // scan results; without it nothing is filtered by extension.
    let extension = cli.directory.as_ref().and(cli.extension.as_deref());
    let worker = Worker {
        mode,
        preflight: Preflight::new(config.min_split_size(), extension, probe),
        splitter: Splitter::new(config.split_options(cli.dry_run))?,
        merger: Merger::new(config.merge_options(cli.dry_run))?,
        sink,
    };

    let outcomes: Vec<ItemOutcome> = if config.jobs <= 1 || targets.len() <= 1 {
        targets.iter().map(|path| worker.process(path)).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.jobs)
            .build()
            .context("failed to start worker pool")?;
        pool.install(|| targets.par_iter().map(|path| worker.process(path)).collect())
    };
    items.extend(outcomes);

    let count = |pred: fn(&ItemOutcome) -> bool| items.iter().filter(|i| pred(i)).count();
    let processed = count(|i| matches!(i, ItemOutcome::Split(_) | ItemOutcome::Merged(_)));
    let skipped = count(|i| matches!(i, ItemOutcome::Skipped { .. }));
    let failed = count(|i| matches!(i, ItemOutcome::Failed { .. }));

    Ok(RunSummary {
        mode,
        dry_run: cli.dry_run,
        processed,
        skipped,
        failed,
        elapsed: started.elapsed(),
        items,
    })
}

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Split => "split",
        Mode::Merge => "merge",
    }
}

/// Explicit paths first, then whatever the directory scan found. A failed
/// scan becomes a failed item rather than aborting the run.
fn gather_targets(cli: &Cli, mode: Mode) -> (Vec<PathBuf>, Vec<ItemOutcome>) {
    let mut targets = cli.files.clone();
    let mut failures = Vec::new();

    if let (Some(directory), Some(extension)) = (&cli.directory, &cli.extension) {
        match collect_candidates(directory, extension, cli.recursive, mode) {
            Ok(found) => targets.extend(found),
            Err(e) => {
                tracing::error!(
                    directory = %directory.display(),
                    error = %e,
                    "directory scan failed"
                );
                failures.push(ItemOutcome::Failed {
                    path: directory.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    (targets, failures)
}

/// Drops targets that resolve to the same file, keeping the first spelling.
fn dedup_targets(targets: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    targets
        .into_iter()
        .filter(|path| {
            let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            let fresh = seen.insert(key);
            if !fresh {
                tracing::debug!(path = %path.display(), "duplicate target ignored");
            }
            fresh
        })
        .collect()
}

struct Worker<'a, P: SpaceProbe> {
    mode: Mode,
    preflight: Preflight<P>,
    splitter: Splitter,
    merger: Merger,
    sink: &'a dyn ProgressSink,
}

impl<P: SpaceProbe> Worker<'_, P> {
    fn process(&self, path: &Path) -> ItemOutcome {
        let result = match self.mode {
            Mode::Split => self
                .preflight
                .check_split(path)
                .and_then(|_| self.splitter.split(path, self.sink).map_err(Rejection::from))
                .map(ItemOutcome::Split),
            Mode::Merge => self
                .preflight
                .check_merge(path)
                .and_then(|_| self.merger.merge(path, self.sink).map_err(Rejection::from))
                .map(ItemOutcome::Merged),
        };

        result.unwrap_or_else(|rejection| classify(path, rejection))
    }
}

/// Validation problems skip the item; anything that went wrong while
/// reading or writing fails it.
fn classify(path: &Path, rejection: Rejection) -> ItemOutcome {
    let path = path.to_path_buf();
    match rejection {
        Rejection::Engine(EngineError::Io { .. } | EngineError::NotFound(_)) => {
            tracing::error!(path = %path.display(), error = %rejection, "item failed");
            ItemOutcome::Failed {
                path,
                error: rejection.to_string(),
            }
        }
        Rejection::Engine(EngineError::InvalidInput(_) | EngineError::InsufficientSpace { .. })
        | Rejection::NotAFile(_)
        | Rejection::NotASplitDirectory(_)
        | Rejection::ExtensionMismatch { .. }
        | Rejection::BelowThreshold { .. } => {
            tracing::warn!(path = %path.display(), reason = %rejection, "item skipped");
            ItemOutcome::Skipped {
                path,
                reason: rejection.to_string(),
            }
        }
    }
}

//! Human-readable progress and summary output.

use std::io::Write;
use std::path::Path;

use nsplitter_engine::{Operation, ProgressEvent, ProgressSink, format_elapsed};

use crate::app::{ItemOutcome, RunSummary};
use nsplitter_collect::Mode;

/// Prints banners and per-part progress lines to stdout.
///
/// In interactive mode tick events redraw the current line with `\r`; with
/// concurrent workers only whole lines are printed.
pub struct ConsoleSink {
    interactive: bool,
}

impl ConsoleSink {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

impl ProgressSink for ConsoleSink {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        let mut out = std::io::stdout().lock();
        match event {
            ProgressEvent::Started {
                op, path, dry_run, ..
            } => {
                let verb = match op {
                    Operation::Split => "SPLITTING",
                    Operation::Merge => "MERGING",
                };
                let suffix = if *dry_run { " (dry run)" } else { "" };
                let title = format!("{verb} {}{suffix}", display_name(path));
                let _ = writeln!(out, "{}", banner(&title));
            }
            ProgressEvent::Tick {
                part,
                total_parts,
                bytes_done,
                total_bytes,
                elapsed,
                ..
            } if self.interactive => {
                let line = progress_line(
                    *part,
                    *total_parts,
                    *bytes_done,
                    *total_bytes,
                    *elapsed,
                    event.fraction(),
                );
                let _ = write!(out, "\r{line}");
                let _ = out.flush();
            }
            ProgressEvent::Tick { .. } => {}
            ProgressEvent::PartFinished {
                part,
                total_parts,
                bytes_done,
                total_bytes,
                elapsed,
                ..
            } => {
                let line = progress_line(
                    *part,
                    *total_parts,
                    *bytes_done,
                    *total_bytes,
                    *elapsed,
                    event.fraction(),
                );
                let lead = if self.interactive { "\r" } else { "" };
                let _ = writeln!(out, "{lead}{line}");
            }
            ProgressEvent::Finished { output, .. } => {
                let _ = writeln!(out, "✓ {}", output.display());
            }
        }
    }
}

fn progress_line(
    part: u64,
    total_parts: u64,
    bytes_done: u64,
    total_bytes: u64,
    elapsed: std::time::Duration,
    fraction: f64,
) -> String {
    format!(
        "[{}] [{}/{}] [{:.2}%] {}/{} bytes",
        format_elapsed(elapsed),
        part + 1,
        total_parts,
        fraction * 100.0,
        group_thousands(bytes_done),
        group_thousands(total_bytes),
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Frames `msg` as a three-line banner.
pub fn banner(msg: &str) -> String {
    let title = format!("== {msg} ==");
    let border = "=".repeat(title.chars().count());
    format!("\n{border}\n{title}\n{border}")
}

/// Formats `n` with `_` between thousands groups (`1_048_576`).
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('_');
        }
        grouped.push(c);
    }
    grouped
}

/// Renders the end-of-run summary.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut lines = vec![banner("SUMMARY")];

    let mut done: Vec<String> = summary
        .items
        .iter()
        .filter_map(|item| match item {
            ItemOutcome::Split(r) => Some(r.split_dir.display().to_string()),
            ItemOutcome::Merged(r) => Some(r.merged_path.display().to_string()),
            _ => None,
        })
        .collect();
    done.sort();
    lines.extend(done.into_iter().map(|path| format!("✓ {path}")));

    for item in &summary.items {
        match item {
            ItemOutcome::Skipped { path, reason } => {
                lines.push(format!("- skipped {}: {reason}", path.display()));
            }
            ItemOutcome::Failed { path, error } => {
                lines.push(format!("✗ failed {}: {error}", path.display()));
            }
            _ => {}
        }
    }

    let verb = match summary.mode {
        Mode::Split => "Split",
        Mode::Merge => "Merged",
    };
    let dry = if summary.dry_run { " (dry run)" } else { "" };
    lines.push(String::new());
    lines.push(format!(
        "{verb} {} files in {}{dry}",
        summary.processed,
        format_elapsed(summary.elapsed)
    ));
    if summary.skipped > 0 || summary.failed > 0 {
        lines.push(format!("{} skipped, {} failed", summary.skipped, summary.failed));
    }
    lines.join("\n")
}

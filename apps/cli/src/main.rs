//! nsplitter entry point.

mod app;
mod cli;
mod config;
mod console;

use clap::Parser;
use nsplitter_engine::{ProgressSink, TracingSink};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::Config;
use crate::console::ConsoleSink;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so progress and summaries own stdout.
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting nsplitter");

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_cli(&cli);
    config.validate()?;

    let sink: Box<dyn ProgressSink> = if cli.json {
        Box::new(TracingSink)
    } else {
        Box::new(ConsoleSink::new(config.jobs == 1))
    };

    let summary = app::run(&cli, &config, sink.as_ref())?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if summary.items.is_empty() {
        println!("No files found to process.");
    } else {
        println!("{}", console::render_summary(&summary));
    }

    Ok(())
}

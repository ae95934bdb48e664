//! nsplitter configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `$XDG_CONFIG_HOME/nsplitter/config.toml` (`~/.config/...`)
//! - Windows: `%APPDATA%/nsplitter/config.toml`
//!
//! A missing file means defaults; command-line flags override file values.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use nsplitter_engine::{
    DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MERGE_BUFFER_SIZE, DEFAULT_SPLIT_BUFFER_SIZE, MergeOptions,
    SplitOptions,
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Maximum part size in bytes.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,

    /// Read buffer used while splitting.
    #[serde(default = "default_split_buffer_size")]
    pub split_buffer_size: usize,

    /// Copy buffer used while merging.
    #[serde(default = "default_merge_buffer_size")]
    pub merge_buffer_size: usize,

    /// Files at or below this size are not split (default: `max_chunk_size`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_split_size: Option<u64>,

    /// Delete source files after splitting.
    #[serde(default)]
    pub remove_source: bool,

    /// Delete split directories after merging.
    #[serde(default = "default_true")]
    pub remove_split_dir: bool,

    /// Stage outputs and rename them into place on success.
    #[serde(default = "default_true")]
    pub atomic: bool,

    /// Number of items processed concurrently.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

fn default_max_chunk_size() -> u64 {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_split_buffer_size() -> usize {
    DEFAULT_SPLIT_BUFFER_SIZE
}

fn default_merge_buffer_size() -> usize {
    DEFAULT_MERGE_BUFFER_SIZE
}

fn default_true() -> bool {
    true
}

fn default_jobs() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            split_buffer_size: default_split_buffer_size(),
            merge_buffer_size: default_merge_buffer_size(),
            min_split_size: None,
            remove_source: false,
            remove_split_dir: default_true(),
            atomic: default_true(),
            jobs: default_jobs(),
        }
    }
}

impl Config {
    /// Loads the configuration from the platform path, or defaults if absent.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Loads the configuration from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Applies command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(size) = cli.chunk_size {
            self.max_chunk_size = size;
        }
        if let Some(jobs) = cli.jobs {
            self.jobs = usize::try_from(jobs).unwrap_or(usize::MAX);
        }
        if cli.clean {
            self.remove_source = true;
        }
        if cli.keep_parts {
            self.remove_split_dir = false;
        }
        if cli.in_place {
            self.atomic = false;
        }
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_chunk_size == 0 {
            bail!("max_chunk_size must be positive");
        }
        if self.split_buffer_size == 0 || self.merge_buffer_size == 0 {
            bail!("buffer sizes must be positive");
        }
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        Ok(())
    }

    /// Size gate for splitting.
    pub fn min_split_size(&self) -> u64 {
        self.min_split_size.unwrap_or(self.max_chunk_size)
    }

    pub fn split_options(&self, dry_run: bool) -> SplitOptions {
        SplitOptions {
            max_chunk_size: self.max_chunk_size,
            buffer_size: self.split_buffer_size,
            dry_run,
            remove_source: self.remove_source,
            atomic: self.atomic,
        }
    }

    pub fn merge_options(&self, dry_run: bool) -> MergeOptions {
        MergeOptions {
            buffer_size: self.merge_buffer_size,
            dry_run,
            remove_split_dir: self.remove_split_dir,
            atomic: self.atomic,
        }
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("nsplitter").join("config.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let base = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var_os("HOME").context("HOME is not set")?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(base.join("nsplitter").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.max_chunk_size, 0xFFFF_0000);
        assert_eq!(config.split_buffer_size, 32 * 1024);
        assert_eq!(config.merge_buffer_size, 4 * 1024 * 1024);
        assert_eq!(config.min_split_size(), config.max_chunk_size);
        assert!(!config.remove_source);
        assert!(config.remove_split_dir);
        assert!(config.atomic);
        assert_eq!(config.jobs, 1);
        config.validate().unwrap();
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            max_chunk_size: 1024,
            split_buffer_size: 64,
            merge_buffer_size: 128,
            min_split_size: Some(10),
            remove_source: true,
            remove_split_dir: false,
            atomic: false,
            jobs: 3,
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn config_partial_toml() {
        let config: Config = toml::from_str("max_chunk_size = 2048\nremove_source = true").unwrap();
        assert_eq!(config.max_chunk_size, 2048);
        assert!(config.remove_source);
        assert_eq!(config.min_split_size(), 2048);
        assert!(config.atomic);
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn config_rejects_unknown_types() {
        assert!(toml::from_str::<Config>("max_chunk_size = \"big\"").is_err());
    }

    #[test]
    fn validate_rejects_zeroes() {
        let zero_chunk = Config {
            max_chunk_size: 0,
            ..Config::default()
        };
        assert!(zero_chunk.validate().is_err());

        let zero_buf = Config {
            merge_buffer_size: 0,
            ..Config::default()
        };
        assert!(zero_buf.validate().is_err());
    }

    #[test]
    fn cli_overrides_file_values() {
        let cli = Cli::parse_from([
            "nsplitter",
            "-s",
            "--chunk-size",
            "1K",
            "--clean",
            "--in-place",
            "-j",
            "2",
            "a.bin",
        ]);
        let mut config = Config::default();
        config.apply_cli(&cli);

        assert_eq!(config.max_chunk_size, 1024);
        assert!(config.remove_source);
        assert!(!config.atomic);
        assert_eq!(config.jobs, 2);
        assert!(config.remove_split_dir);

        let split = config.split_options(true);
        assert!(split.dry_run);
        assert_eq!(split.max_chunk_size, 1024);
    }

    #[test]
    fn keep_parts_flag() {
        let cli = Cli::parse_from(["nsplitter", "-m", "--keep-parts", "x.split.bin"]);
        let mut config = Config::default();
        config.apply_cli(&cli);
        assert!(!config.merge_options(false).remove_split_dir);
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "jobs = 4\natomic = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.jobs, 4);
        assert!(!config.atomic);
    }

    #[test]
    fn load_from_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load_from(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn config_path_not_empty() {
        let path = config_path().unwrap();
        assert!(path.to_string_lossy().contains("nsplitter"));
    }
}

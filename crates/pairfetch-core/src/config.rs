use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::{StatusPolicy, TaskOptions};
use crate::pool::PoolSettings;
use crate::report::OutputFormat;
use crate::storage::PartialPolicy;

/// Global configuration, optionally loaded from `~/.config/pairfetch/config.toml`.
///
/// Every field has a default so a partial file (or no file at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Number of downloads allowed in flight at once.
    pub workers: usize,
    /// Jobs that may wait in the queue before reading stdin blocks.
    pub queue_capacity: usize,
    /// What to do with the body of a non-200 response.
    pub on_bad_status: StatusPolicy,
    /// What to leave on disk when a job fails.
    pub partial_files: PartialPolicy,
    /// Seconds allowed for the TCP/TLS connect phase (0 = no limit).
    pub connect_timeout_secs: u64,
    /// Abort when throughput stays below `low_speed_limit` for this many seconds (0 = never).
    pub stall_timeout_secs: u64,
    /// Bytes per second under which a transfer counts as stalled.
    pub low_speed_limit: u32,
    /// Hard wall-clock limit for a whole transfer in seconds (0 = no limit).
    pub total_timeout_secs: u64,
    /// Maximum number of redirects followed per request.
    pub max_redirects: u32,
    /// Format of the completion lines written to stdout.
    pub output_format: OutputFormat,
    /// Append log events to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 64,
            on_bad_status: StatusPolicy::Abort,
            partial_files: PartialPolicy::TempRename,
            connect_timeout_secs: 30,
            stall_timeout_secs: 60,
            low_speed_limit: 1,
            total_timeout_secs: 0,
            max_redirects: 10,
            output_format: OutputFormat::Plain,
            log_file: None,
        }
    }
}

impl FetchConfig {
    /// Reject values the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be at least 1");
        }
        Ok(())
    }

    /// Per-task download options derived from this config.
    pub fn task_options(&self) -> TaskOptions {
        TaskOptions {
            status_policy: self.on_bad_status,
            partial_policy: self.partial_files,
            connect_timeout: secs(self.connect_timeout_secs),
            stall_timeout: secs(self.stall_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            total_timeout: secs(self.total_timeout_secs),
            max_redirects: self.max_redirects,
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
        }
    }
}

fn secs(n: u64) -> Option<std::time::Duration> {
    (n > 0).then(|| std::time::Duration::from_secs(n))
}

/// Location of the user config file, if one exists. Never creates it.
pub fn default_config_path() -> Option<PathBuf> {
    xdg::BaseDirectories::with_prefix("pairfetch")
        .ok()?
        .find_config_file("config.toml")
}

/// Parse a config file.
pub fn load_from_path(path: &Path) -> Result<FetchConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: FetchConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

/// Load `explicit` if given, else the XDG config file if present, else defaults.
pub fn load(explicit: Option<&Path>) -> Result<FetchConfig> {
    if let Some(path) = explicit {
        return load_from_path(path);
    }
    match default_config_path() {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            load_from_path(&path)
        }
        None => Ok(FetchConfig::default()),
    }
}

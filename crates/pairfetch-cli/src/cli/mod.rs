//! CLI for pairfetch.

mod run;

use anyhow::Result;
use clap::Parser;
use pairfetch_core::config::{self, FetchConfig};
use pairfetch_core::fetch::StatusPolicy;
use pairfetch_core::logging;
use pairfetch_core::report::OutputFormat;
use pairfetch_core::storage::PartialPolicy;
use std::path::PathBuf;

/// Reads `URL PATH` pairs from stdin and downloads each URL to its path
/// while reading continues. Flags override the config file.
#[derive(Debug, Parser)]
#[command(name = "pairfetch")]
#[command(about = "Download URL/path pairs read from stdin, concurrently", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/pairfetch/config.toml when it exists).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of downloads in flight at once.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Jobs that may wait for a worker before reading stdin pauses.
    #[arg(long = "queue", value_name = "N")]
    pub queue_capacity: Option<usize>,

    /// Non-200 responses: abort (write nothing) or continue (write the body).
    #[arg(long, value_name = "POLICY")]
    pub on_bad_status: Option<StatusPolicy>,

    /// Failed jobs: temp-rename, delete or keep the partial file.
    #[arg(long = "partial", value_name = "POLICY")]
    pub partial_files: Option<PartialPolicy>,

    /// Connect timeout in seconds (0 = none).
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// Abort a transfer that makes no progress for this many seconds (0 = never).
    #[arg(long, value_name = "SECS")]
    pub stall_timeout: Option<u64>,

    /// Hard limit for a whole transfer in seconds (0 = none).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum redirects followed per request.
    #[arg(long, value_name = "N")]
    pub max_redirects: Option<u32>,

    /// Completion output: plain, banner or json.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Append logs to this file instead of stderr.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply every flag that was given on top of `cfg`.
    pub fn apply_overrides(&self, cfg: &mut FetchConfig) {
        if let Some(n) = self.workers {
            cfg.workers = n;
        }
        if let Some(n) = self.queue_capacity {
            cfg.queue_capacity = n;
        }
        if let Some(p) = self.on_bad_status {
            cfg.on_bad_status = p;
        }
        if let Some(p) = self.partial_files {
            cfg.partial_files = p;
        }
        if let Some(s) = self.connect_timeout {
            cfg.connect_timeout_secs = s;
        }
        if let Some(s) = self.stall_timeout {
            cfg.stall_timeout_secs = s;
        }
        if let Some(s) = self.timeout {
            cfg.total_timeout_secs = s;
        }
        if let Some(n) = self.max_redirects {
            cfg.max_redirects = n;
        }
        if let Some(f) = self.format {
            cfg.output_format = f;
        }
        if let Some(p) = &self.log_file {
            cfg.log_file = Some(p.clone());
        }
    }
}

/// Parse arguments, set up logging and run until stdin is exhausted.
/// Returns the process exit code.
pub async fn run_from_args() -> Result<i32> {
    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut cfg);
    cfg.validate()?;

    if let Err(e) = logging::init_logging(cfg.log_file.as_deref()) {
        logging::init_logging_stderr();
        tracing::warn!("{:#}; logging to stderr", e);
    }
    tracing::debug!("effective config: {:?}", cfg);

    let summary = run::run_stdin(&cfg).await?;
    Ok(summary.exit_code())
}

#[cfg(test)]
mod tests;

//! Outcome reporting: the only component that writes to stdout.
//!
//! Consumes `JobOutcome`s from the pool, keeps a running tally and prints
//! completion lines in the configured format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use tokio::sync::mpsc;

use crate::fetch::FailureKind;
use crate::job::JobOutcome;

const BANNER_RULE: &str = "---------------";

/// Format of the lines written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// `<path>  done` per completed job.
    #[default]
    Plain,
    /// Multi-line "job is done" banner with URL and path.
    Banner,
    /// One JSON object per job, failures included.
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Plain => "plain",
            OutputFormat::Banner => "banner",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(OutputFormat::Plain),
            "banner" => Ok(OutputFormat::Banner),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{}' (expected plain, banner or json)",
                other
            )),
        }
    }
}

/// Aggregate counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub bytes_written: u64,
}

impl Tally {
    pub fn total(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.cancelled == 0
    }
}

#[derive(Serialize)]
struct OutcomeRecord<'a> {
    id: u64,
    url: &'a str,
    path: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes_written: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_status: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    elapsed_ms: u64,
}

impl<'a> OutcomeRecord<'a> {
    fn from_outcome(outcome: &'a JobOutcome) -> Self {
        let mut record = OutcomeRecord {
            id: outcome.job.id,
            url: &outcome.job.url,
            path: outcome.job.destination.display().to_string(),
            status: "completed",
            bytes_written: None,
            http_status: None,
            kind: None,
            error: None,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
        };
        match &outcome.result {
            Ok(report) => {
                record.bytes_written = Some(report.bytes_written);
                record.http_status = Some(report.http_status);
            }
            Err(e) => {
                let kind = e.kind();
                record.status = if kind == FailureKind::Cancelled {
                    "cancelled"
                } else {
                    "failed"
                };
                record.kind = Some(kind);
                record.error = Some(e.to_string());
            }
        }
        record
    }
}

pub struct Reporter<W> {
    out: W,
    format: OutputFormat,
    tally: Tally,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            tally: Tally::default(),
        }
    }

    /// Count one outcome and print it. The tally is updated even if writing fails.
    pub fn record(&mut self, outcome: &JobOutcome) -> io::Result<()> {
        match &outcome.result {
            Ok(report) => {
                self.tally.completed += 1;
                self.tally.bytes_written += report.bytes_written;
            }
            Err(e) if e.kind() == FailureKind::Cancelled => self.tally.cancelled += 1,
            Err(_) => self.tally.failed += 1,
        }

        match (self.format, outcome.is_success()) {
            (OutputFormat::Plain, true) => {
                writeln!(self.out, "{}  done", outcome.job.destination.display())?;
            }
            (OutputFormat::Banner, true) => {
                writeln!(
                    self.out,
                    "{rule}\njob is done\nurl -> {}\npath\n{}\n{rule}",
                    outcome.job.url,
                    outcome.job.destination.display(),
                    rule = BANNER_RULE
                )?;
            }
            (OutputFormat::Json, _) => {
                serde_json::to_writer(&mut self.out, &OutcomeRecord::from_outcome(outcome))?;
                writeln!(self.out)?;
            }
            (_, false) => {}
        }
        self.out.flush()
    }

    pub fn tally(&self) -> Tally {
        self.tally
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Drain `outcomes` until the channel closes, then return the reporter.
pub async fn run_reporter<W: Write>(
    mut outcomes: mpsc::Receiver<JobOutcome>,
    mut reporter: Reporter<W>,
) -> Reporter<W> {
    while let Some(outcome) = outcomes.recv().await {
        if let Err(e) = reporter.record(&outcome) {
            tracing::warn!(job = outcome.job.id, "failed to write completion line: {}", e);
        }
    }
    let tally = reporter.tally();
    tracing::info!(
        completed = tally.completed,
        failed = tally.failed,
        cancelled = tally.cancelled,
        bytes = tally.bytes_written,
        "all jobs finished"
    );
    reporter
}

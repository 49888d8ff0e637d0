//! Job model: one (URL, destination) pair read from input.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::{DownloadError, DownloadReport};

/// Sequence number assigned by the input reader; the first job is 1.
pub type JobId = u64;

/// A single download request. Neither field is validated: a malformed URL or
/// unwritable path is passed through and fails inside the download task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub destination: PathBuf,
}

impl Job {
    pub fn new(id: JobId, url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            id,
            url: url.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} ({} -> {})", self.id, self.url, self.destination.display())
    }
}

/// The single structured result a worker produces for every job it dequeues.
#[derive(Debug)]
pub struct JobOutcome {
    pub job: Job,
    pub result: Result<DownloadReport, DownloadError>,
    pub elapsed: Duration,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

//! Download task errors and their reporting categories.

use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single job failed. Every variant is terminal for that job only.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("create file {}: {source}", .path.display())]
    FileCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("http get error: {0}")]
    Request(#[source] curl::Error),
    #[error("http response code is {0} not 200")]
    UnexpectedStatus(u32),
    #[error("body copy error: {0}")]
    StreamRead(#[source] curl::Error),
    #[error("body copy error: write: {0}")]
    StreamWrite(#[source] io::Error),
    #[error("finalize {}: {source}", .path.display())]
    Finalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("timed out: {0}")]
    TimedOut(#[source] curl::Error),
    #[error("cancelled")]
    Cancelled,
    #[error("download task panicked")]
    Panicked,
}

/// Coarse failure category used in logs, JSON output and the run tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    FileCreate,
    Request,
    UnexpectedStatus,
    StreamCopy,
    Finalize,
    TimedOut,
    Cancelled,
    Internal,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::FileCreate => "file_create",
            FailureKind::Request => "request",
            FailureKind::UnexpectedStatus => "unexpected_status",
            FailureKind::StreamCopy => "stream_copy",
            FailureKind::Finalize => "finalize",
            FailureKind::TimedOut => "timed_out",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        }
    }
}

impl DownloadError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DownloadError::FileCreate { .. } => FailureKind::FileCreate,
            DownloadError::Request(_) => FailureKind::Request,
            DownloadError::UnexpectedStatus(_) => FailureKind::UnexpectedStatus,
            DownloadError::StreamRead(_) | DownloadError::StreamWrite(_) => FailureKind::StreamCopy,
            DownloadError::Finalize { .. } => FailureKind::Finalize,
            DownloadError::TimedOut(_) => FailureKind::TimedOut,
            DownloadError::Cancelled => FailureKind::Cancelled,
            DownloadError::Panicked => FailureKind::Internal,
        }
    }
}

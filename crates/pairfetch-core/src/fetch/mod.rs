//! The per-job download task.
//!
//! A linear sequence: create the output file, issue one GET through libcurl,
//! check the final status, stream the body into the file, finalize. The first
//! failing step ends the job with a `DownloadError`; nothing is retried.
//! Runs in the current thread; call from `spawn_blocking` when used from async code.

mod error;
mod status;

pub use error::{DownloadError, FailureKind};

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::control::CancelToken;
use crate::job::Job;
use crate::storage::{DownloadFile, PartialPolicy};

/// What to do with the body of a response whose final status is not 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusPolicy {
    /// Log the status and fail the job before writing any body bytes.
    #[default]
    Abort,
    /// Log the status and write the body anyway.
    Continue,
}

impl StatusPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusPolicy::Abort => "abort",
            StatusPolicy::Continue => "continue",
        }
    }
}

impl fmt::Display for StatusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort" => Ok(StatusPolicy::Abort),
            "continue" => Ok(StatusPolicy::Continue),
            other => Err(format!(
                "unknown status policy '{}' (expected abort or continue)",
                other
            )),
        }
    }
}

/// Read-only settings shared by every download task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOptions {
    pub status_policy: StatusPolicy,
    pub partial_policy: PartialPolicy,
    pub connect_timeout: Option<Duration>,
    /// Abort once throughput stays under `low_speed_limit` bytes/s for this long.
    pub stall_timeout: Option<Duration>,
    pub low_speed_limit: u32,
    pub total_timeout: Option<Duration>,
    pub max_redirects: u32,
}

impl Default for TaskOptions {
    fn default() -> Self {
        FetchConfig::default().task_options()
    }
}

/// Successful job result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    pub bytes_written: u64,
    /// Final status after redirects; only differs from 200 under `StatusPolicy::Continue`.
    pub http_status: u32,
}

/// Run one job to completion. Logs each step; the failure itself is logged
/// once here and returned so the caller can report it.
pub fn download(
    job: &Job,
    options: &TaskOptions,
    cancel: &CancelToken,
) -> Result<DownloadReport, DownloadError> {
    tracing::info!(
        job = job.id,
        url = %job.url,
        path = %job.destination.display(),
        "start new job"
    );
    let result = run_steps(job, options, cancel);
    match &result {
        Ok(report) => tracing::info!(
            job = job.id,
            url = %job.url,
            path = %job.destination.display(),
            bytes = report.bytes_written,
            "job is done"
        ),
        Err(e) => tracing::warn!(
            job = job.id,
            url = %job.url,
            path = %job.destination.display(),
            kind = e.kind().as_str(),
            "{}",
            e
        ),
    }
    result
}

fn run_steps(
    job: &Job,
    options: &TaskOptions,
    cancel: &CancelToken,
) -> Result<DownloadReport, DownloadError> {
    if cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    let mut file = DownloadFile::create(&job.destination, options.partial_policy).map_err(
        |source| DownloadError::FileCreate {
            path: job.destination.clone(),
            source,
        },
    )?;
    tracing::info!(job = job.id, path = %file.write_path().display(), "create file");

    if cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }

    let http_status = get_into(job, options, cancel, &mut file)?;

    file.finish().map_err(DownloadError::StreamWrite)?;
    let bytes_written = file.bytes_written();
    file.commit().map_err(|source| DownloadError::Finalize {
        path: job.destination.clone(),
        source,
    })?;

    Ok(DownloadReport {
        bytes_written,
        http_status,
    })
}

/// Perform the GET, streaming the body into `file`. Returns the final status code.
fn get_into(
    job: &Job,
    options: &TaskOptions,
    cancel: &CancelToken,
    file: &mut DownloadFile,
) -> Result<u32, DownloadError> {
    if !is_http_url(&job.url) {
        return Err(DownloadError::Request(curl::Error::new(CURLE_UNSUPPORTED_PROTOCOL as _)));
    }
    let mut easy = curl::easy::Easy::new();
    configure(&mut easy, &job.url, options).map_err(DownloadError::Request)?;

    // Status of the most recent header block; redirects and 1xx replace it.
    let status = Cell::new(None::<u32>);
    let body_started = Cell::new(false);
    let rejected = Cell::new(None::<u32>);
    let write_error = RefCell::new(None::<std::io::Error>);

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                if let Some(code) = status::parse_status_line(line) {
                    status.set(Some(code));
                }
                true
            })
            .map_err(DownloadError::Request)?;
        transfer
            .write_function(|data| {
                if !body_started.get() {
                    body_started.set(true);
                    let code = status.get().unwrap_or(0);
                    if !accept_status(job, code, options.status_policy) {
                        rejected.set(Some(code));
                        return Ok(0);
                    }
                }
                match file.write_all(data) {
                    Ok(()) => Ok(data.len()),
                    Err(e) => {
                        write_error.borrow_mut().replace(e);
                        // Short count makes curl abort with a write error.
                        Ok(0)
                    }
                }
            })
            .map_err(DownloadError::Request)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(DownloadError::Request)?;
        transfer.perform()
    };

    if let Err(e) = performed {
        if let Some(code) = rejected.get() {
            return Err(DownloadError::UnexpectedStatus(code));
        }
        if let Some(io_err) = write_error.borrow_mut().take() {
            return Err(DownloadError::StreamWrite(io_err));
        }
        if cancel.is_cancelled() || e.is_aborted_by_callback() {
            return Err(DownloadError::Cancelled);
        }
        if e.is_operation_timedout() {
            return Err(DownloadError::TimedOut(e));
        }
        if body_started.get() {
            return Err(DownloadError::StreamRead(e));
        }
        return Err(DownloadError::Request(e));
    }

    let code = easy.response_code().map_err(DownloadError::Request)?;
    // Empty body: the write callback never ran, so check the status here.
    if !body_started.get() && !accept_status(job, code, options.status_policy) {
        return Err(DownloadError::UnexpectedStatus(code));
    }
    Ok(code)
}

const CURLE_UNSUPPORTED_PROTOCOL: std::os::raw::c_int = 1;

/// Only `http://` and `https://` URLs are fetched; curl would otherwise read
/// `file://` or `ftp://` URLs, which carry no HTTP status.
fn is_http_url(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}

fn configure(
    easy: &mut curl::easy::Easy,
    url: &str,
    options: &TaskOptions,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(options.max_redirects)?;
    if let Some(t) = options.connect_timeout {
        easy.connect_timeout(t)?;
    }
    if let Some(t) = options.stall_timeout {
        easy.low_speed_limit(options.low_speed_limit.max(1))?;
        easy.low_speed_time(t)?;
    }
    if let Some(t) = options.total_timeout {
        easy.timeout(t)?;
    }
    // Enables the progress callback that polls the cancel token.
    easy.progress(true)?;
    Ok(())
}

/// Logs receipt of the final response; returns false if the body must not be written.
fn accept_status(job: &Job, code: u32, policy: StatusPolicy) -> bool {
    tracing::info!(
        job = job.id,
        status = code,
        "response from {} for file {} received",
        job.url,
        job.destination.display()
    );
    if code == 200 {
        return true;
    }
    tracing::warn!(job = job.id, status = code, policy = policy.as_str(), "http response code is {} not 200", code);
    policy == StatusPolicy::Continue
}

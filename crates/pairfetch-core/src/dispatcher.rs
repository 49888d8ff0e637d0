//! Input dispatcher: reads job pairs and hands them to the worker pool.
//!
//! Never waits for a download to finish; it only waits when the pool's queue
//! is full. Stops at end of input, on a read error, or on cancellation. A
//! cancel interrupts a pending read but never drops a job already read.

use tokio::io::AsyncBufRead;

use crate::control::CancelToken;
use crate::input::JobReader;
use crate::pool::WorkerPool;

/// Why dispatching stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfInput,
    ReadError,
    PoolClosed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub submitted: u64,
    /// Trailing URL that had no destination path.
    pub dangling_token: Option<String>,
    pub stopped_by: StopReason,
}

/// Read pairs from `input` until it ends, submitting one job per pair.
pub async fn dispatch<R>(input: R, pool: &WorkerPool, cancel: &CancelToken) -> DispatchSummary
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = JobReader::new(input);
    let mut submitted = 0u64;

    let stopped_by = loop {
        if cancel.is_cancelled() {
            tracing::info!("dispatcher cancelled");
            break StopReason::Cancelled;
        }
        let next = tokio::select! {
            next = reader.next_job() => next,
            _ = cancel.cancelled() => {
                tracing::info!("dispatcher cancelled while waiting for input");
                break StopReason::Cancelled;
            }
        };
        let job = match next {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::info!(jobs = reader.jobs_read(), "end of input");
                break StopReason::EndOfInput;
            }
            Err(e) => {
                tracing::error!("input read error, no further jobs accepted: {}", e);
                break StopReason::ReadError;
            }
        };
        tracing::debug!("accepted {}", job);
        // A job that was read is always queued, even after cancel: the worker
        // that dequeues it reports it as cancelled.
        if let Err(e) = pool.submit(job).await {
            tracing::error!("{:#}", e);
            break StopReason::PoolClosed;
        }
        submitted += 1;
    };

    let dangling_token = reader.dangling_token().map(str::to_owned);
    if let Some(token) = &dangling_token {
        tracing::warn!(token = %token, "ignoring trailing token without a destination path");
    }

    DispatchSummary {
        submitted,
        dangling_token,
        stopped_by,
    }
}

//! Wire stdin → dispatcher → worker pool → reporter → stdout.
//!
//! Ctrl-C sets the cancel token: dispatch stops reading, and every job already
//! read still comes back from the pool, as cancelled if it had not finished.

use anyhow::{Context, Result};
use pairfetch_core::config::FetchConfig;
use pairfetch_core::control::CancelToken;
use pairfetch_core::dispatcher::{self, DispatchSummary, StopReason};
use pairfetch_core::pool::WorkerPool;
use pairfetch_core::report::{self, Reporter, Tally};
use std::io::Write;
use tokio::io::{AsyncBufRead, BufReader};

/// What happened over one run.
#[derive(Debug)]
pub struct RunSummary {
    pub tally: Tally,
    pub dispatch: DispatchSummary,
}

impl RunSummary {
    /// 0 only when input ended cleanly and every job completed.
    pub fn exit_code(&self) -> i32 {
        if self.dispatch.stopped_by == StopReason::EndOfInput && self.tally.all_succeeded() {
            0
        } else {
            1
        }
    }
}

pub async fn run_stdin(cfg: &FetchConfig) -> Result<RunSummary> {
    let cancel = CancelToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("interrupted, cancelling outstanding jobs");
                    cancel.cancel();
                }
                Err(e) => tracing::warn!("cannot listen for Ctrl-C: {}", e),
            }
        })
    };

    let summary = run_input(
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
        cfg,
        cancel,
    )
    .await;
    interrupt.abort();
    summary
}

/// Run every job read from `input`, writing completion lines to `out`.
/// Returns once input has stopped and every job read has been reported.
pub async fn run_input<R, W>(
    input: R,
    out: W,
    cfg: &FetchConfig,
    cancel: CancelToken,
) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
{
    let (pool, outcomes) = WorkerPool::spawn(cfg.task_options(), cfg.pool_settings(), cancel.clone());
    let reporter = tokio::spawn(report::run_reporter(
        outcomes,
        Reporter::new(out, cfg.output_format),
    ));

    let dispatch = dispatcher::dispatch(input, &pool, &cancel).await;

    pool.shutdown().await?;
    let reporter = reporter.await.context("reporter task")?;

    Ok(RunSummary {
        tally: reporter.tally(),
        dispatch,
    })
}

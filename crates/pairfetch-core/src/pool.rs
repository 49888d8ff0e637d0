//! Bounded worker pool fed by a job queue.
//!
//! `workers` tasks pull from one bounded queue and run each download on the
//! blocking thread pool; every dequeued job yields exactly one `JobOutcome`
//! on the result channel. Submitting waits while the queue is full.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::control::CancelToken;
use crate::fetch::{self, DownloadError, DownloadReport, TaskOptions};
use crate::job::{Job, JobId, JobOutcome};

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Downloads allowed in flight at once.
    pub workers: usize,
    /// Jobs that may wait before `submit` blocks.
    pub queue_capacity: usize,
}

pub struct WorkerPool {
    queue: mpsc::Sender<Job>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Start the workers. The returned receiver yields one outcome per job and
    /// closes after `shutdown` once every queued job has been processed.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        options: TaskOptions,
        settings: PoolSettings,
        cancel: CancelToken,
    ) -> (Self, mpsc::Receiver<JobOutcome>) {
        let worker_count = settings.workers.max(1);
        let capacity = settings.queue_capacity.max(1);
        let (queue_tx, queue_rx) = mpsc::channel::<Job>(capacity);
        let (outcome_tx, outcome_rx) = mpsc::channel::<JobOutcome>(capacity + worker_count);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let options = Arc::new(options);

        let mut workers = JoinSet::new();
        for worker in 0..worker_count {
            workers.spawn(run_worker(
                worker,
                Arc::clone(&queue_rx),
                outcome_tx.clone(),
                Arc::clone(&options),
                cancel.clone(),
            ));
        }
        tracing::debug!(workers = worker_count, queue_capacity = capacity, "worker pool started");

        (
            WorkerPool {
                queue: queue_tx,
                workers,
            },
            outcome_rx,
        )
    }

    /// Queue a job, waiting for space if the queue is full.
    pub async fn submit(&self, job: Job) -> Result<()> {
        self.queue
            .send(job)
            .await
            .map_err(|e| anyhow::anyhow!("worker pool closed, dropped job {}", e.0.id))
    }

    /// Close the queue and wait until every queued job has produced its outcome.
    pub async fn shutdown(self) -> Result<()> {
        let WorkerPool { queue, mut workers } = self;
        drop(queue);
        while let Some(res) = workers.join_next().await {
            res.map_err(|e| anyhow::anyhow!("worker task join: {}", e))?;
        }
        tracing::debug!("worker pool drained");
        Ok(())
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    outcomes: mpsc::Sender<JobOutcome>,
    options: Arc<TaskOptions>,
    cancel: CancelToken,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };
        let started = Instant::now();
        let result = if cancel.is_cancelled() {
            tracing::debug!(worker, job = job.id, "cancelled before start");
            Err(DownloadError::Cancelled)
        } else {
            let task_job = job.clone();
            let task_options = Arc::clone(&options);
            let task_cancel = cancel.clone();
            run_blocking(worker, job.id, move || {
                fetch::download(&task_job, &task_options, &task_cancel)
            })
            .await
        };
        let outcome = JobOutcome {
            job,
            result,
            elapsed: started.elapsed(),
        };
        if outcomes.send(outcome).await.is_err() {
            tracing::debug!(worker, "outcome receiver dropped, worker stopping");
            break;
        }
    }
}

/// Run `task` on the blocking pool; a panic in it becomes `DownloadError::Panicked`.
async fn run_blocking<F>(worker: usize, job: JobId, task: F) -> Result<DownloadReport, DownloadError>
where
    F: FnOnce() -> Result<DownloadReport, DownloadError> + Send + 'static,
{
    tokio::task::spawn_blocking(task).await.unwrap_or_else(|e| {
        tracing::error!(worker, job, "download task failed: {}", e);
        Err(DownloadError::Panicked)
    })
}

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::join_all;
use log::warn;
use tokio::sync::Semaphore;

use crate::error::Error;
use crate::networking::NetworkClient;
use crate::progress::ProgressSink;

/// Default cap on transfers in flight.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// One transfer: where a bundle lives and where it lands. Never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub remote_url: String,
    pub local_path: PathBuf,
}

/// Terminal record for one task. Exactly one is produced per task whether
/// the transfer succeeded or not.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub task: DownloadTask,
    pub bytes_written: u64,
    pub error: Option<Error>,
}

impl DownloadOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Batch totals derivable from the outcome sequence alone.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub bytes_written: u64,
}

pub fn summarize(outcomes: &[DownloadOutcome]) -> BatchSummary {
    outcomes.iter().fold(BatchSummary::default(), |mut acc, o| {
        if o.succeeded() {
            acc.succeeded += 1;
            acc.bytes_written += o.bytes_written;
        } else {
            acc.failed += 1;
        }
        acc
    })
}

/// Drives a batch of transfers with bounded concurrency.
///
/// A failed task is recorded and never cancels or delays its siblings; a
/// partially written destination file is left in place for inspection.
pub struct DownloadScheduler {
    concurrency: usize,
}

impl DownloadScheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Run every task against the shared client, at most `concurrency`
    /// transfers in flight at any instant.
    pub async fn run(
        &self,
        tasks: Vec<DownloadTask>,
        client: &NetworkClient,
        sink: &dyn ProgressSink,
    ) -> Vec<DownloadOutcome> {
        self.run_with(tasks, sink, |task| async move {
            client
                .download_to_path(&task.remote_url, &task.local_path, |delta| {
                    sink.bytes_transferred(delta);
                })
                .await
        })
        .await
    }

    /// Transfer seam: tests substitute a fake transport here to observe
    /// concurrency and failure behavior without a network.
    pub(crate) async fn run_with<F, Fut>(
        &self,
        tasks: Vec<DownloadTask>,
        sink: &dyn ProgressSink,
        transfer: F,
    ) -> Vec<DownloadOutcome>
    where
        F: Fn(DownloadTask) -> Fut,
        Fut: Future<Output = Result<u64, Error>>,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let transfer = &transfer;

        let runs = tasks.into_iter().map(|task| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                // The permit is the only shared mutable state between tasks.
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("download semaphore is never closed");
                let outcome = match transfer(task.clone()).await {
                    Ok(bytes) => DownloadOutcome {
                        task,
                        bytes_written: bytes,
                        error: None,
                    },
                    Err(error) => {
                        warn!("{}: {error}", task.remote_url);
                        DownloadOutcome {
                            task,
                            bytes_written: 0,
                            error: Some(error),
                        }
                    }
                };
                sink.task_finished(&outcome);
                outcome
            }
        });

        join_all(runs).await
    }
}

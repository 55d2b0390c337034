use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

use crate::download::DownloadOutcome;
use crate::util::format_speed;

/// Consumer of transfer events. The scheduler drives one of these; hooks
/// default to no-ops so tests and quiet callers can pass [`NullSink`].
pub trait ProgressSink: Send + Sync {
    fn bytes_transferred(&self, _bytes: u64) {}
    fn task_finished(&self, _outcome: &DownloadOutcome) {}
}

/// Sink that swallows every event.
#[allow(dead_code)]
pub struct NullSink;

impl ProgressSink for NullSink {}

/// Console bar: position tracks finished tasks, the message shows the
/// cumulative transfer speed.
pub struct ConsoleProgress {
    bar: ProgressBar,
    started: Instant,
    bytes: AtomicU64,
}

impl ConsoleProgress {
    pub fn new(total_tasks: usize) -> Self {
        let bar = ProgressBar::new(total_tasks as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self {
            bar,
            started: Instant::now(),
            bytes: AtomicU64::new(0),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for ConsoleProgress {
    fn bytes_transferred(&self, bytes: u64) {
        let total = self.bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let elapsed = self.started.elapsed().as_secs_f32();
        if elapsed > 0.0 {
            self.bar.set_message(format_speed(total as f32 / elapsed));
        }
    }

    fn task_finished(&self, outcome: &DownloadOutcome) {
        if let Some(error) = &outcome.error {
            self.bar
                .println(format!("failed: {} ({error})", outcome.task.remote_url));
        }
        self.bar.inc(1);
    }
}

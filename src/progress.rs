//! Phase progress reporting over `tracing`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Logs a task's start, every 10% of progress, and its finish.
#[derive(Debug)]
pub struct ProgressLogger {
    task: &'static str,
    volume: u64,
    done: AtomicU64,
    logged_percent: AtomicU64,
    started: Instant,
}

impl ProgressLogger {
    pub fn new(task: &'static str, volume: u64) -> Self {
        Self {
            task,
            volume,
            done: AtomicU64::new(0),
            logged_percent: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn log_start(&self) {
        tracing::info!(task = self.task, volume = self.volume, "progress.start");
    }

    /// Record `delta` units of work; emits at most one event per 10% step.
    pub fn log_progress(&self, delta: u64) {
        if self.volume == 0 || delta == 0 {
            return;
        }
        let done = self.done.fetch_add(delta, Ordering::Relaxed) + delta;
        let percent = (done.min(self.volume) * 100 / self.volume) / 10 * 10;
        let logged = self.logged_percent.load(Ordering::Relaxed);
        if percent > logged
            && self
                .logged_percent
                .compare_exchange(logged, percent, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            tracing::info!(task = self.task, percent, "progress");
        }
    }

    pub fn log_finish(&self) {
        tracing::info!(
            task = self.task,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "progress.finish"
        );
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

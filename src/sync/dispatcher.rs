//! Worker pool that drains one cycle's plan through the downloader.
//!
//! # Concurrency Model
//!
//! - The coordinator is the only producer: it pushes every planned path into a
//!   bounded queue, then drops the sender to close it
//! - A fixed number of worker tasks share the single receiver; each worker holds
//!   the receiver lock only while waiting for its next path
//! - A worker exits when the queue is closed and drained
//! - The coordinator awaits every worker handle before returning, so a dispatch
//!   run never overlaps the next cycle
//!
//! Each path is received by exactly one worker, so no file is downloaded twice
//! in a cycle. Per-file errors are logged and counted, never propagated.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, warn};

use super::planner::SyncPlan;
use super::progress::Progress;
use crate::config::{MAX_WORKERS, MIN_WORKERS};
use crate::download::Downloader;

/// Error type for worker pool configuration.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkerCount {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Statistics from one dispatch run.
///
/// Uses atomic counters for updates from concurrent workers.
#[derive(Debug, Default)]
pub struct DispatchStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl DispatchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successfully downloaded files.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed files.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Fixed-size pool of download workers.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Creates a pool of `workers` concurrent downloaders.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidWorkerCount`] if the value is outside
    /// the valid range (1-100).
    pub fn new(workers: usize) -> Result<Self, DispatchError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(DispatchError::InvalidWorkerCount { value: workers });
        }
        Ok(Self { workers })
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Downloads every planned path and returns once all workers have exited.
    ///
    /// Progress is reported per entry as it is queued, based on declared sizes.
    #[instrument(skip(self, plan, downloader), fields(workers = self.workers, planned = plan.len()))]
    pub async fn dispatch(
        &self,
        plan: &SyncPlan,
        downloader: Arc<Downloader>,
        show_progress: bool,
    ) -> DispatchStats {
        let stats = Arc::new(DispatchStats::new());
        let (sender, receiver) = mpsc::channel::<String>(self.workers);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let receiver = Arc::clone(&receiver);
            let downloader = Arc::clone(&downloader);
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                run_worker(worker_id, &receiver, &downloader, &stats).await;
            }));
        }

        let mut progress = Progress::new(plan.total_bytes(), show_progress);
        for entry in plan.entries() {
            progress.advance(&entry.record.path, entry.record.size);
            if sender.send(entry.record.path.clone()).await.is_err() {
                // Every worker is gone; the join loop below reports why.
                warn!("work queue closed early, remaining entries skipped");
                break;
            }
        }
        drop(sender);

        debug!(
            task_count = handles.len(),
            "waiting for workers to finish"
        );
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "download worker panicked");
            }
        }

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            "dispatch complete"
        );

        // All workers have been joined, so this is the last reference.
        Arc::try_unwrap(stats).unwrap_or_else(|shared| {
            let copy = DispatchStats::new();
            copy.completed.store(shared.completed(), Ordering::SeqCst);
            copy.failed.store(shared.failed(), Ordering::SeqCst);
            copy
        })
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: &Mutex<mpsc::Receiver<String>>,
    downloader: &Downloader,
    stats: &DispatchStats,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(path) = next else {
            debug!(worker_id, "queue drained, worker exiting");
            return;
        };

        match downloader.download(&path).await {
            Ok(local) => {
                debug!(worker_id, path = %local.display(), "downloaded");
                stats.increment_completed();
            }
            Err(e) => {
                warn!(worker_id, path = %path, error = %e, "download failed");
                stats.increment_failed();
            }
        }
    }
}

//! Polling sync loop: fetch manifest, plan, dispatch, sleep.
//!
//! Each cycle downloads the manifest, compares it against the destination
//! folder and hands the stale paths to a fixed worker pool. A cycle only
//! returns once every worker has finished, so cycles never overlap.
//!
//! A manifest failure ends the loop with [`SyncError`]. Individual file
//! failures are logged and retried naturally on the next cycle, since the file
//! stays stale on disk.

mod dispatcher;
mod error;
mod planner;
mod progress;

pub use dispatcher::{DispatchError, DispatchStats, WorkerPool};
pub use error::{StartupError, SyncError};
pub use planner::{PlanEntry, StaleReason, SyncPlan, plan};
pub use progress::Progress;

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::Settings;
use crate::credential::{BasicAuth, derive_credential};
use crate::download::{Downloader, HttpClient, Throttle};
use crate::manifest::fetch_manifest;

/// Outcome of one sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Records parsed from the manifest, duplicates and ignored paths included.
    pub manifest_records: usize,
    /// Files selected for download.
    pub planned: usize,
    /// Files downloaded successfully.
    pub completed: usize,
    /// Files whose download failed.
    pub failed: usize,
}

/// The client's top-level state: settings, a shared downloader and a worker pool.
#[derive(Debug)]
pub struct SyncLoop {
    settings: Settings,
    downloader: Arc<Downloader>,
    pool: WorkerPool,
}

impl SyncLoop {
    /// Creates a loop over an already-built downloader.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if `settings.workers` is out of range.
    pub fn new(settings: Settings, downloader: Arc<Downloader>) -> Result<Self, DispatchError> {
        let pool = WorkerPool::new(settings.workers)?;
        Ok(Self {
            settings,
            downloader,
            pool,
        })
    }

    /// Builds the production loop: derives the host credential and wires an
    /// HTTP downloader throttled to each worker's share of the speed cap.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError`] if the settings are invalid, the credential
    /// cannot be derived or the HTTP client cannot be built.
    pub fn from_settings(settings: Settings) -> Result<Self, StartupError> {
        settings.validate()?;
        let credential = derive_credential()?;
        let client =
            HttpClient::new_with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs)
                .map_err(StartupError::Client)?;

        let auth = BasicAuth::new(settings.account.clone(), credential, settings.auth_order);
        let downloader = Downloader::new(
            Arc::new(client),
            auth,
            settings.base_url(),
            settings.download_folder.clone(),
            Throttle::per_second(settings.rate_per_worker()),
        );

        Self::new(settings, Arc::new(downloader)).map_err(StartupError::from)
    }

    /// Runs a single fetch, plan and dispatch pass.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Manifest`] if the manifest cannot be downloaded or
    /// parsed. Per-file failures are counted in the report instead.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let records = fetch_manifest(&self.downloader).await?;
        let plan = plan(&records, &self.settings).await;

        info!(
            manifest_records = records.len(),
            planned = plan.len(),
            bytes = plan.total_bytes(),
            "sync plan ready"
        );

        let stats = if plan.is_empty() {
            DispatchStats::new()
        } else {
            self.pool
                .dispatch(
                    &plan,
                    Arc::clone(&self.downloader),
                    self.settings.show_progress,
                )
                .await
        };

        Ok(CycleReport {
            manifest_records: records.len(),
            planned: plan.len(),
            completed: stats.completed(),
            failed: stats.failed(),
        })
    }

    /// Runs cycles until one fails, sleeping the poll interval in between.
    ///
    /// With a poll interval below one second, exactly one cycle runs.
    ///
    /// # Errors
    ///
    /// Returns the first [`SyncError`]; a manifest failure ends the loop.
    pub async fn run(&self) -> Result<(), SyncError> {
        loop {
            let report = self.run_cycle().await?;
            info!(
                completed = report.completed,
                failed = report.failed,
                "cycle finished"
            );

            let Some(interval) = self.settings.poll_interval() else {
                info!("single pass requested, exiting");
                return Ok(());
            };

            info!(seconds = interval.as_secs(), "waiting for the next check");
            tokio::time::sleep(interval).await;
        }
    }
}

//! hfsync Core Library
//!
//! This library provides the core functionality for the hfsync client, which
//! periodically fetches a manifest of a remote file set and mirrors every missing
//! or stale file into a local folder through a small pool of throttled workers.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Settings file loading and validation
//! - [`credential`] - Per-machine credential and basic-auth pairing
//! - [`download`] - Rate-limited fetch and atomic replace of single files
//! - [`manifest`] - Remote file index fetching and parsing
//! - [`sync`] - Diff planning, worker pool dispatch and the polling loop

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod credential;
pub mod download;
pub mod manifest;
pub mod sync;

// Re-export commonly used types
pub use config::{AuthOrder, ConfigError, Settings};
pub use credential::{BasicAuth, Credential, CredentialError, derive_credential};
pub use download::{
    Body, DownloadError, Downloader, HttpClient, Throttle, TransferStats, Transport,
};
pub use manifest::{MANIFEST_NAME, ManifestError, ManifestRecord, fetch_manifest, parse_manifest};
pub use sync::{
    CycleReport, DispatchError, DispatchStats, PlanEntry, StaleReason, StartupError, SyncError,
    SyncLoop, SyncPlan, WorkerPool, plan,
};

//! Fatal error types for startup and the sync loop.
//!
//! Per-file download failures never appear here: workers log them and move on.

use thiserror::Error;

use crate::config::ConfigError;
use crate::credential::CredentialError;
use crate::manifest::ManifestError;

/// Errors that halt the sync loop. Only the manifest stage can fail a cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The manifest could not be fetched or parsed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Errors that prevent the client from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Settings file missing, unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The host credential could not be derived.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The worker pool configuration is invalid.
    #[error(transparent)]
    Dispatch(#[from] super::dispatcher::DispatchError),
}

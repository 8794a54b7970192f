//! Error types for the manifest module.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that stop a sync cycle before any file is planned.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest itself could not be downloaded.
    #[error("failed to download manifest: {0}")]
    Download(#[from] DownloadError),

    /// The downloaded manifest could not be read back from disk.
    #[error("failed to read manifest {path}: {source}")]
    Read {
        /// Local manifest path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not well-formed CSV (bad quoting, invalid UTF-8).
    #[error("failed to parse manifest: {0}")]
    Csv(#[from] csv::Error),
}

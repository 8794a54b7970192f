//! Rate-limited download of single files.
//!
//! This module turns one manifest relative path into a file under the
//! destination root.
//!
//! # Features
//!
//! - Per-segment percent-encoding of manifest paths into server URLs
//! - Authenticated GET through a pluggable [`Transport`] (reqwest in production)
//! - Hard per-second byte cap per transfer ([`Throttle`])
//! - Atomic replace: the body lands in `<dest>_TMP` and is renamed over `<dest>`
//!   only once complete
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hfsync_core::config::AuthOrder;
//! use hfsync_core::credential::{BasicAuth, derive_credential};
//! use hfsync_core::download::{Downloader, HttpClient, Throttle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = BasicAuth::new("alice", derive_credential()?, AuthOrder::CredentialFirst);
//! let downloader = Downloader::new(
//!     Arc::new(HttpClient::new()?),
//!     auth,
//!     "http://files.example:80",
//!     "/srv/mirror",
//!     Throttle::per_second(333_000),
//! );
//! let path = downloader.download("docs/readme.txt").await?;
//! println!("Downloaded: {}", path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod downloader;
mod error;
mod remote_path;
mod throttle;

pub use client::{Body, HttpClient, Transport};
pub use downloader::{Downloader, temp_path_for};
pub use error::DownloadError;
pub use remote_path::{
    encode_relative_path, is_contained_path, local_path, normalize_relative_path, remote_url,
};
pub use throttle::{Throttle, TransferStats};

//! Single-file download protocol: throttled fetch into a temp file, then atomic replace.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::{debug, info, instrument, warn};

use super::client::Transport;
use super::constants::TEMP_SUFFIX;
use super::error::DownloadError;
use super::remote_path::{local_path, remote_url};
use super::throttle::Throttle;
use crate::credential::BasicAuth;

/// Downloads manifest paths from the server into the destination root.
///
/// Cheap to share: workers hold it behind an `Arc`.
pub struct Downloader {
    transport: Arc<dyn Transport>,
    auth: BasicAuth,
    base_url: String,
    root: PathBuf,
    throttle: Throttle,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("auth", &self.auth)
            .field("base_url", &self.base_url)
            .field("root", &self.root)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}

impl Downloader {
    /// Creates a downloader.
    ///
    /// * `base_url` - server URL with port, e.g. `http://files.example:80`
    /// * `root` - destination root directory
    /// * `throttle` - per-transfer bandwidth cap
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        auth: BasicAuth,
        base_url: impl Into<String>,
        root: impl Into<PathBuf>,
        throttle: Throttle,
    ) -> Self {
        Self {
            transport,
            auth,
            base_url: base_url.into(),
            root: root.into(),
            throttle,
        }
    }

    /// Downloads one manifest path and returns the final local path.
    ///
    /// The body is streamed into `<dest>_TMP` under the throttle; only a complete
    /// transfer is renamed over `<dest>`. On failure the destination is left as it
    /// was and the temp file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for an unusable path, directory or temp file
    /// creation failures, request failures, non-success statuses, transfer errors
    /// and rename failures.
    #[instrument(skip(self), fields(url))]
    pub async fn download(&self, relative_path: &str) -> Result<PathBuf, DownloadError> {
        let dest = local_path(&self.root, relative_path)
            .ok_or_else(|| DownloadError::invalid_path(relative_path))?;
        let url = remote_url(&self.base_url, relative_path);
        tracing::Span::current().record("url", url.as_str());

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let temp_path = temp_path_for(&dest);
        let file = File::create(&temp_path)
            .await
            .map_err(|e| DownloadError::io(&temp_path, e))?;

        let result = self.fetch_into(&url, file, &temp_path).await;
        if let Err(e) = result {
            debug!(path = %temp_path.display(), "removing temp file after error");
            if let Err(cleanup) = tokio::fs::remove_file(&temp_path).await {
                warn!(path = %temp_path.display(), error = %cleanup, "failed to remove temp file");
            }
            return Err(e);
        }

        promote(&temp_path, &dest).await?;
        Ok(dest)
    }

    /// Fetches `url` and copies the body into `file` under the throttle.
    async fn fetch_into(
        &self,
        url: &str,
        file: File,
        temp_path: &Path,
    ) -> Result<(), DownloadError> {
        let mut body = self.transport.fetch(url, &self.auth).await?;

        let mut writer = BufWriter::new(file);
        let stats = self
            .throttle
            .copy(&mut body, &mut writer)
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;

        // Close before the rename.
        let file = writer.into_inner();
        file.sync_all()
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;
        drop(file);

        info!(
            path = %temp_path.display(),
            bytes = stats.bytes,
            ticks = stats.ticks,
            "transfer complete"
        );
        Ok(())
    }
}

/// Returns `<dest>_TMP`.
#[must_use]
pub fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Removes any previous destination and renames the temp file into place.
async fn promote(temp_path: &Path, dest: &Path) -> Result<(), DownloadError> {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!(path = %dest.display(), "removed previous version"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            let _ = tokio::fs::remove_file(temp_path).await;
            return Err(DownloadError::io(dest, e));
        }
    }

    // The previous version is already gone here: a failed rename leaves no
    // file at `dest` until the next cycle downloads it again.
    if let Err(e) = tokio::fs::rename(temp_path, dest).await {
        warn!(
            path = %dest.display(),
            error = %e,
            "rename failed after removing the previous version, destination is missing until the next cycle"
        );
        let _ = tokio::fs::remove_file(temp_path).await;
        return Err(DownloadError::io(dest, e));
    }
    Ok(())
}

//! Declared-size progress accounting for a dispatch run.
//!
//! Progress counts the manifest's declared sizes of entries handed to the
//! worker queue, not bytes actually transferred.

use tracing::{debug, info};

/// Running progress over a plan.
#[derive(Debug, Clone)]
pub struct Progress {
    total_bytes: u64,
    done_bytes: u64,
    visible: bool,
}

impl Progress {
    /// Starts progress over `total_bytes` declared bytes.
    ///
    /// `visible` selects info-level `[N%] - path` lines instead of debug ones.
    #[must_use]
    pub fn new(total_bytes: u64, visible: bool) -> Self {
        Self {
            total_bytes,
            done_bytes: 0,
            visible,
        }
    }

    /// Percent of declared bytes already handed out, 0 for an all-empty plan.
    #[must_use]
    pub fn percent(&self) -> u64 {
        if self.total_bytes == 0 {
            return 0;
        }
        let percent = u128::from(self.done_bytes) * 100 / u128::from(self.total_bytes);
        u64::try_from(percent.min(100)).unwrap_or(100)
    }

    /// Reports `path` at the current percentage, then counts its `size` as done.
    pub fn advance(&mut self, path: &str, size: u64) {
        let percent = self.percent();
        if self.visible {
            info!("[{percent}%] - {path}");
        } else {
            debug!(percent, path, "dispatching");
        }
        self.done_bytes = self.done_bytes.saturating_add(size);
    }
}

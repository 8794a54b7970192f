//! Constants for the download module (timeouts, throttling, temp files).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP per-read idle timeout (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Length of one throttle tick; each worker copies at most its cap per tick.
pub const THROTTLE_TICK: Duration = Duration::from_secs(1);

/// Suffix appended to the destination path while a download is in flight.
pub const TEMP_SUFFIX: &str = "_TMP";

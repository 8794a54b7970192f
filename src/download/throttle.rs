//! Per-worker bandwidth cap using bounded copies on a fixed tick.
//!
//! Every tick a transfer may copy at most `bytes_per_tick` bytes; it then
//! sleeps until the next tick boundary. This is a hard per-tick ceiling, not a
//! token bucket: unused allowance is never carried over, so there is no burst.
//! Boundaries come from tokio's monotonic clock (`sleep_until`), not from an
//! interval timer, so a slow copy pushes the schedule back instead of
//! triggering catch-up ticks.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hfsync_core::download::Throttle;
//!
//! # async fn example() -> std::io::Result<()> {
//! let throttle = Throttle::new(4, Duration::from_secs(1));
//! let mut body: &[u8] = b"0123456789";
//! let mut sink = Vec::new();
//! let stats = throttle.copy(&mut body, &mut sink).await?;
//! assert_eq!(stats.bytes, 10);
//! assert_eq!(stats.ticks, 3);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::trace;

use super::constants::THROTTLE_TICK;

/// Result of one throttled transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Total bytes copied.
    pub bytes: u64,
    /// Number of bounded copy iterations, including the final short one.
    pub ticks: u64,
}

/// Bandwidth cap for a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    bytes_per_tick: u64,
    tick: Duration,
}

impl Throttle {
    /// Creates a throttle copying at most `bytes_per_tick` bytes per `tick`.
    ///
    /// A cap of zero is raised to one byte so transfers always progress.
    #[must_use]
    pub fn new(bytes_per_tick: u64, tick: Duration) -> Self {
        Self {
            bytes_per_tick: bytes_per_tick.max(1),
            tick,
        }
    }

    /// Creates a throttle with a one second tick.
    #[must_use]
    pub fn per_second(bytes_per_second: u64) -> Self {
        Self::new(bytes_per_second, THROTTLE_TICK)
    }

    /// Returns the byte cap per tick.
    #[must_use]
    pub fn bytes_per_tick(&self) -> u64 {
        self.bytes_per_tick
    }

    /// Returns the tick length.
    #[must_use]
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Copies `reader` into `writer`, at most `bytes_per_tick` bytes per tick.
    ///
    /// The first copy starts immediately; copy `k` starts no earlier than
    /// `start + k * tick`. A copy returning fewer bytes than the cap means the
    /// reader hit end-of-stream and ends the transfer. The writer is flushed
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns the first read or write error; bytes already written stay in
    /// the writer.
    pub async fn copy<R, W>(&self, reader: &mut R, writer: &mut W) -> std::io::Result<TransferStats>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut stats = TransferStats::default();
        let mut next_tick = Instant::now();

        loop {
            tokio::time::sleep_until(next_tick).await;

            let mut bounded = (&mut *reader).take(self.bytes_per_tick);
            let copied = tokio::io::copy(&mut bounded, writer).await?;
            stats.bytes += copied;
            stats.ticks += 1;
            trace!(copied, total = stats.bytes, tick = stats.ticks, "bounded copy");

            if copied < self.bytes_per_tick {
                break;
            }

            next_tick += self.tick;
            let now = Instant::now();
            if next_tick < now {
                next_tick = now;
            }
        }

        writer.flush().await?;
        Ok(stats)
    }
}

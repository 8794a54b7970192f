//! Diff planning: which manifest records need downloading this cycle.
//!
//! Only existence, whole-second modification time and (optionally) zero length
//! of the local file are inspected. Content is never hashed.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::download::normalize_relative_path;
use crate::manifest::ManifestRecord;

/// Why a record was selected for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No local file exists.
    Missing,
    /// The local file is older than the remote one.
    Outdated,
    /// The local file is empty and empty files are treated as stale.
    Empty,
}

/// A record selected for download.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    /// The manifest record.
    pub record: ManifestRecord,
    /// Why it is downloaded.
    pub reason: StaleReason,
}

/// Ordered set of records to download in one cycle, in manifest order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    entries: Vec<PlanEntry>,
}

impl SyncPlan {
    /// Returns the planned entries.
    #[must_use]
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Number of planned files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing needs downloading.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the declared sizes of every planned record.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, entry| acc.saturating_add(entry.record.size))
    }

    /// Planned relative paths, in plan order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.record.path.as_str())
    }
}

/// Compares manifest records against the destination folder.
///
/// For each record, in manifest order: ignored prefixes are skipped without
/// touching the filesystem; the local file is stat'ed; a stat error other than
/// "not found" is logged and the record skipped until the next cycle; otherwise
/// the record is planned when the file is absent, older than the remote
/// modification time (whole seconds), or empty with `redownload_empty` set.
///
/// Paths are compared in normalized form, so `a.txt` and `./a.txt` name the
/// same file. When a file appears more than once, the last occurrence wins and
/// takes the position of that last occurrence. Planned records carry the
/// normalized path.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn plan(records: &[ManifestRecord], settings: &Settings) -> SyncPlan {
    let mut entries = Vec::new();

    for (path, record) in last_occurrences(records) {
        if settings.is_ignored(&path) {
            debug!(path = %path, "ignored");
            continue;
        }

        let local = settings.download_folder.join(&path);

        let reason = match tokio::fs::metadata(&local).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(StaleReason::Missing),
            Err(e) => {
                warn!(path = %local.display(), error = %e, "cannot inspect local file, skipping");
                None
            }
            Ok(meta) => {
                let local_secs = meta.modified().map(unix_secs).ok();
                if local_secs.is_some_and(|secs| secs < record.modified_secs()) {
                    Some(StaleReason::Outdated)
                } else if settings.redownload_empty && meta.len() == 0 {
                    Some(StaleReason::Empty)
                } else {
                    None
                }
            }
        };

        if let Some(reason) = reason {
            debug!(path = %path, ?reason, "planned");
            entries.push(PlanEntry {
                record: ManifestRecord {
                    path,
                    ..record.clone()
                },
                reason,
            });
        }
    }

    debug!(planned = entries.len(), "plan built");
    SyncPlan { entries }
}

/// Pairs each record with its normalized path and drops every record that is
/// shadowed by a later record naming the same local file.
///
/// Paths that cannot be normalized are logged and dropped here.
fn last_occurrences(records: &[ManifestRecord]) -> Vec<(String, &ManifestRecord)> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());
    for record in records.iter().rev() {
        let Some(path) = normalize_relative_path(&record.path) else {
            warn!(path = %record.path, "path escapes the destination folder, skipping");
            continue;
        };
        if seen.insert(path.clone()) {
            kept.push((path, record));
        }
    }
    kept.reverse();
    kept
}

/// Whole seconds since the epoch, floored (negative before 1970).
#[allow(clippy::cast_possible_wrap)]
fn unix_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs() as i64,
        Err(before) => {
            let before = before.duration();
            let secs = before.as_secs() as i64;
            if before.subsec_nanos() > 0 { -secs - 1 } else { -secs }
        }
    }
}

//! Remote file index fetching and parsing.
//!
//! The server publishes its file set as `files.csv`: one row per file with the
//! relative path, the modification time in seconds since the epoch (fractional
//! values allowed) and the size in bytes. Any further fields are ignored so the
//! server can grow the format without breaking older clients.
//!
//! ```text
//! docs/readme.txt,1700000000.25,1024
//! "dir, with comma/a.bin",1699999999,2048,extra,fields
//! ```

mod error;

pub use error::ManifestError;

use tracing::{debug, info, instrument, warn};

use crate::download::{Downloader, normalize_relative_path};

/// Well-known relative name of the manifest on the server.
pub const MANIFEST_NAME: &str = "files.csv";

/// One entry of the remote file index.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRecord {
    /// Relative path, also the record's key within one manifest.
    pub path: String,
    /// Remote modification time in seconds since the epoch.
    pub modified: f64,
    /// Declared size in bytes. Only used for progress reporting.
    pub size: u64,
}

impl ManifestRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(path: impl Into<String>, modified: f64, size: u64) -> Self {
        Self {
            path: path.into(),
            modified,
            size,
        }
    }

    /// Remote modification time truncated to whole seconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn modified_secs(&self) -> i64 {
        self.modified.trunc() as i64
    }
}

/// Parses manifest CSV content.
///
/// Rows that cannot describe a file are skipped with a warning instead of
/// failing the whole manifest: fewer than three fields, an empty path, a path
/// escaping the destination root, or a non-numeric modification time. A
/// non-numeric size is read as zero. Paths are stored in their normalized
/// spelling (`./a//b` becomes `a/b`).
///
/// # Errors
///
/// Returns [`ManifestError::Csv`] if the content is not well-formed CSV or not UTF-8.
pub fn parse_manifest(content: &[u8]) -> Result<Vec<ManifestRecord>, ManifestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in reader.records() {
        let row = row?;
        let line = row.position().map_or(0, csv::Position::line);

        match record_from_row(&row) {
            Ok(record) => records.push(record),
            Err(reason) => {
                skipped += 1;
                warn!(line, reason, "skipping manifest row");
            }
        }
    }

    debug!(records = records.len(), skipped, "manifest parsed");
    Ok(records)
}

fn record_from_row(row: &csv::StringRecord) -> Result<ManifestRecord, &'static str> {
    let (Some(path), Some(modified), Some(size)) = (row.get(0), row.get(1), row.get(2)) else {
        return Err("expected at least path, modification time and size");
    };

    if path.is_empty() {
        return Err("empty path");
    }
    let Some(normalized) = normalize_relative_path(path) else {
        return Err("path escapes the destination folder");
    };

    let modified = modified
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|m| m.is_finite())
        .ok_or("modification time is not a number")?;

    let size = size.trim().parse::<u64>().unwrap_or_else(|_| {
        debug!(path, size, "non-numeric size, counting as zero");
        0
    });

    Ok(ManifestRecord {
        path: normalized,
        modified,
        size,
    })
}

/// Downloads and parses the manifest.
///
/// The manifest goes through the same throttled, atomically replaced download
/// as every other file and is kept as `files.csv` under the destination root.
///
/// # Errors
///
/// Returns [`ManifestError`] if the download, the read back or the parse fails.
/// Any of them is fatal for the cycle.
#[instrument(skip(downloader))]
pub async fn fetch_manifest(downloader: &Downloader) -> Result<Vec<ManifestRecord>, ManifestError> {
    info!("downloading file index");
    let path = downloader.download(MANIFEST_NAME).await?;
    let content = tokio::fs::read(&path)
        .await
        .map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
    parse_manifest(&content)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_rows() {
        let records = parse_manifest(b"a.txt,1000,10\ndir/b.bin,1500.75,2048\n").unwrap();
        assert_eq!(
            records,
            vec![
                ManifestRecord::new("a.txt", 1000.0, 10),
                ManifestRecord::new("dir/b.bin", 1500.75, 2048),
            ]
        );
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let records = parse_manifest(b"a.txt,1000,10,sha,owner\nb.txt,1,2\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], ManifestRecord::new("a.txt", 1000.0, 10));
    }

    #[test]
    fn test_parse_quoted_path_with_comma() {
        let records = parse_manifest(b"\"dir, x/a \"\"q\"\".txt\",5,1\n").unwrap();
        assert_eq!(records[0].path, "dir, x/a \"q\".txt");
    }

    #[test]
    fn test_parse_skips_short_rows() {
        let records = parse_manifest(b"a.txt,1000\nb.txt,1,2\nlonely\n").unwrap();
        assert_eq!(records, vec![ManifestRecord::new("b.txt", 1.0, 2)]);
    }

    #[test]
    fn test_parse_skips_bad_modification_time() {
        let records = parse_manifest(b"a.txt,yesterday,10\nb.txt,NaN,1\nc.txt,3,1\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "c.txt");
    }

    #[test]
    fn test_parse_bad_size_counts_as_zero() {
        let records = parse_manifest(b"a.txt,10,big\n").unwrap();
        assert_eq!(records, vec![ManifestRecord::new("a.txt", 10.0, 0)]);
    }

    #[test]
    fn test_parse_skips_escaping_and_empty_paths() {
        let records =
            parse_manifest(b"../etc/passwd,1,1\n/abs,1,1\n,1,1\nok.txt,1,1\n").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "ok.txt");
    }

    #[test]
    fn test_parse_normalizes_path_spelling() {
        let records = parse_manifest(b"./a.txt,1,1\ndir//b.txt,1,1\n").unwrap();
        let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "dir/b.txt"]);
    }

    #[test]
    fn test_parse_empty_manifest() {
        assert!(parse_manifest(b"").unwrap().is_empty());
    }

    #[test]
    fn test_parse_keeps_duplicates_for_planner() {
        let records = parse_manifest(b"a.txt,1,1\na.txt,2,2\n").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_invalid_utf8_is_fatal() {
        let err = parse_manifest(b"a.txt,1,1\n\xff\xfe,1,1\n").unwrap_err();
        assert!(matches!(err, ManifestError::Csv(_)));
    }

    #[test]
    fn test_modified_secs_truncates() {
        assert_eq!(ManifestRecord::new("a", 1500.99, 0).modified_secs(), 1500);
        assert_eq!(ManifestRecord::new("a", 0.5, 0).modified_secs(), 0);
    }
}

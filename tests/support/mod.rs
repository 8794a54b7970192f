//! Shared helpers for integration tests.
//!
//! [`MemoryServer`] is an in-memory [`Transport`] keyed by relative path. It
//! counts every fetch so tests can assert which files a cycle touched.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use hfsync_core::{
    AuthOrder, BasicAuth, Body, Credential, DownloadError, Downloader, Settings, Throttle,
    Transport,
};

/// Base URL every test downloader points at.
pub const BASE_URL: &str = "http://files.example:80";

#[derive(Default)]
struct State {
    files: HashMap<String, Vec<u8>>,
    fetches: HashMap<String, usize>,
}

/// In-memory file server.
#[derive(Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<State>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `content` at the already-encoded relative URL path.
    pub fn put(&self, encoded_path: &str, content: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(encoded_path.to_string(), content.into());
    }

    pub fn remove(&self, encoded_path: &str) {
        self.state.lock().unwrap().files.remove(encoded_path);
    }

    /// Publishes a manifest built from `(path, mtime, size)` rows.
    pub fn put_manifest(&self, rows: &[(&str, f64, u64)]) {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for (path, modified, size) in rows {
            writer
                .write_record([(*path).to_string(), modified.to_string(), size.to_string()])
                .unwrap();
        }
        self.put("files.csv", writer.into_inner().unwrap());
    }

    /// Number of fetches of one encoded relative path.
    pub fn fetch_count(&self, encoded_path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .fetches
            .get(encoded_path)
            .copied()
            .unwrap_or(0)
    }

    /// Total fetches of everything except the manifest.
    pub fn file_fetches(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .fetches
            .iter()
            .filter(|(path, _)| path.as_str() != "files.csv")
            .map(|(_, count)| count)
            .sum()
    }

    pub fn reset_counts(&self) {
        self.state.lock().unwrap().fetches.clear();
    }
}

#[async_trait]
impl Transport for MemoryServer {
    async fn fetch(&self, url: &str, _auth: &BasicAuth) -> Result<Body, DownloadError> {
        let relative = url
            .strip_prefix(BASE_URL)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(url)
            .to_string();

        let mut state = self.state.lock().unwrap();
        *state.fetches.entry(relative.clone()).or_default() += 1;
        match state.files.get(&relative) {
            Some(content) => Ok(Box::pin(std::io::Cursor::new(content.clone()))),
            None => Err(DownloadError::http_status(url, 404, "Not Found")),
        }
    }
}

pub fn test_auth() -> BasicAuth {
    BasicAuth::new(
        "alice",
        Credential::from_host_identity("test-host", &["aa:bb:cc:dd:ee:ff"]),
        AuthOrder::CredentialFirst,
    )
}

/// Single-pass settings with three workers rooted at `root`.
pub fn settings(root: &Path) -> Settings {
    let mut settings = Settings::new("http://files.example", root);
    settings.poll_interval_secs = 0;
    settings.show_progress = false;
    settings
}

/// Downloader over `server` with a throttle wide enough to never sleep.
pub fn downloader(server: &MemoryServer, root: &Path) -> Arc<Downloader> {
    Arc::new(Downloader::new(
        Arc::new(server.clone()),
        test_auth(),
        BASE_URL,
        root,
        Throttle::per_second(16 << 20),
    ))
}

/// Writes `content` at `root/relative` with the given mtime in whole seconds.
pub fn write_local(root: &Path, relative: &str, content: &[u8], mtime_secs: u64) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(mtime_secs))
        .unwrap();
}

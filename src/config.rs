//! Settings file loading and validation.
//!
//! The settings file is TOML with `[user]`, `[server]`, `[files]` and an optional
//! `[sync]` table. It is read once at startup into an immutable [`Settings`]
//! value that is passed by reference into every component that needs it.
//!
//! ```toml
//! [user]
//! name = "alice"
//!
//! [server]
//! url = "http://files.example"
//! port = 8080
//! download_speed = 1000   # aggregate KB/s, shared evenly by the workers
//!
//! [files]
//! check_time = 21600      # seconds between polls, < 1 runs a single pass
//! ignore_list = ["private/", "tmp/"]
//! download_folder = "/srv/mirror"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Default server port.
const DEFAULT_PORT: u16 = 80;

/// Default aggregate download speed in kilobytes per second.
const DEFAULT_DOWNLOAD_SPEED_KB: u64 = 1000;

/// Default poll interval (6 hours).
const DEFAULT_CHECK_TIME_SECS: i64 = 21_600;

/// Default number of download workers.
pub const DEFAULT_WORKERS: usize = 3;

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
pub const MAX_WORKERS: usize = 100;

/// Errors raised while loading or validating settings. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// Settings file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML or does not match the expected layout.
    #[error("failed to decode settings file {path}: {source}")]
    Parse {
        /// Settings file path (`<inline>` for in-memory sources).
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// `files.download_folder` is missing or empty.
    #[error("download folder not defined, set `download_folder` in the [files] table")]
    MissingDownloadFolder,

    /// A value is present but outside its accepted range.
    #[error("invalid settings value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted key of the offending value.
        field: &'static str,
        /// Human readable explanation.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Order of the two fields in the HTTP basic-auth pair.
///
/// The server registers machines by their derived credential, and deployments
/// disagree on whether it travels as the user name or the password.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthOrder {
    /// User name = machine credential, password = account name.
    #[default]
    CredentialFirst,
    /// User name = account name, password = machine credential.
    AccountFirst,
}

/// Immutable runtime settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Account name sent alongside the machine credential.
    pub account: String,
    /// Server base URL without port (e.g. `http://files.example`).
    pub server_url: String,
    /// Server port appended to the base URL.
    pub port: u16,
    /// Aggregate download cap in kilobytes per second, before division by workers.
    pub download_speed_kb: u64,
    /// Seconds between sync cycles; values below 1 run a single cycle.
    pub poll_interval_secs: i64,
    /// Case-sensitive path prefixes that are never inspected or downloaded.
    pub ignore_prefixes: Vec<String>,
    /// Destination root directory.
    pub download_folder: PathBuf,
    /// Number of concurrent download workers.
    pub workers: usize,
    /// Basic-auth field ordering.
    pub auth_order: AuthOrder,
    /// Treat zero-length local files as stale.
    pub redownload_empty: bool,
    /// Log `[N%] - path` lines at info level while dispatching.
    pub show_progress: bool,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP per-read idle timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Settings {
    /// Creates settings with defaults for everything but the server and destination.
    #[must_use]
    pub fn new(server_url: impl Into<String>, download_folder: impl Into<PathBuf>) -> Self {
        Self {
            account: String::new(),
            server_url: server_url.into(),
            port: DEFAULT_PORT,
            download_speed_kb: DEFAULT_DOWNLOAD_SPEED_KB,
            poll_interval_secs: DEFAULT_CHECK_TIME_SECS,
            ignore_prefixes: Vec::new(),
            download_folder: download_folder.into(),
            workers: DEFAULT_WORKERS,
            auth_order: AuthOrder::default(),
            redownload_empty: false,
            show_progress: true,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }

    /// Loads and validates settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, [`ConfigError::Parse`]
    /// if it is not valid settings TOML, and a validation error otherwise.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = parse_settings(&raw, path)?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Parses and validates settings from TOML text.
    ///
    /// # Errors
    ///
    /// Same as [`from_file`](Self::from_file), minus the read error.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        parse_settings(raw, Path::new("<inline>"))
    }

    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download_folder.as_os_str().is_empty() {
            return Err(ConfigError::MissingDownloadFolder);
        }

        match url::Url::parse(&self.server_url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(ConfigError::invalid(
                    "server.url",
                    format!("unsupported scheme '{}'", parsed.scheme()),
                ));
            }
            Err(e) => {
                return Err(ConfigError::invalid(
                    "server.url",
                    format!("'{}' is not a URL: {e}", self.server_url),
                ));
            }
        }

        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::invalid(
                "sync.workers",
                format!(
                    "{} is outside {MIN_WORKERS}..={MAX_WORKERS}",
                    self.workers
                ),
            ));
        }

        if self.download_speed_kb == 0 {
            return Err(ConfigError::invalid(
                "server.download_speed",
                "must be at least 1 KB/s",
            ));
        }

        validate_timeout_secs("sync.connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("sync.read_timeout_secs", self.read_timeout_secs)?;

        Ok(())
    }

    /// Per-worker byte cap per second: the aggregate speed divided evenly across workers.
    #[must_use]
    pub fn rate_per_worker(&self) -> u64 {
        let workers = u64::try_from(self.workers.max(1)).unwrap_or(u64::MAX);
        (self.download_speed_kb.saturating_mul(1000) / workers).max(1)
    }

    /// Delay between cycles, or `None` when the loop should run a single pass.
    #[must_use]
    pub fn poll_interval(&self) -> Option<Duration> {
        u64::try_from(self.poll_interval_secs)
            .ok()
            .filter(|secs| *secs >= 1)
            .map(Duration::from_secs)
    }

    /// Returns true when `path` starts with any ignore prefix.
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Server base URL with the port attached, e.g. `http://files.example:8080`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.server_url.trim_end_matches('/'), self.port)
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{value} is outside 1..=3600"),
        ));
    }
    Ok(())
}

fn parse_settings(raw: &str, path: &Path) -> Result<Settings, ConfigError> {
    let file: FileConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = file.into_settings()?;
    settings.validate()?;
    Ok(settings)
}

/// On-disk layout of the settings file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    user: UserTable,
    server: ServerTable,
    #[serde(default)]
    files: FilesTable,
    #[serde(default)]
    sync: SyncTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserTable {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerTable {
    url: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_download_speed")]
    download_speed: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilesTable {
    #[serde(default = "default_check_time")]
    check_time: i64,
    #[serde(default)]
    ignore_list: Vec<String>,
    #[serde(default)]
    download_folder: Option<PathBuf>,
}

impl Default for FilesTable {
    fn default() -> Self {
        Self {
            check_time: DEFAULT_CHECK_TIME_SECS,
            ignore_list: Vec::new(),
            download_folder: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SyncTable {
    #[serde(default = "default_workers")]
    workers: usize,
    #[serde(default)]
    auth_order: AuthOrder,
    #[serde(default)]
    redownload_empty: bool,
    #[serde(default = "default_show_progress")]
    show_progress: bool,
    #[serde(default = "default_connect_timeout")]
    connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    read_timeout_secs: u64,
}

impl Default for SyncTable {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            auth_order: AuthOrder::default(),
            redownload_empty: false,
            show_progress: true,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

impl FileConfig {
    fn into_settings(self) -> Result<Settings, ConfigError> {
        let download_folder = self
            .files
            .download_folder
            .filter(|folder| !folder.as_os_str().is_empty())
            .ok_or(ConfigError::MissingDownloadFolder)?;

        Ok(Settings {
            account: self.user.name,
            server_url: self.server.url,
            port: self.server.port,
            download_speed_kb: self.server.download_speed,
            poll_interval_secs: self.files.check_time,
            ignore_prefixes: self.files.ignore_list,
            download_folder,
            workers: self.sync.workers,
            auth_order: self.sync.auth_order,
            redownload_empty: self.sync.redownload_empty,
            show_progress: self.sync.show_progress,
            connect_timeout_secs: self.sync.connect_timeout_secs,
            read_timeout_secs: self.sync.read_timeout_secs,
        })
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_download_speed() -> u64 {
    DEFAULT_DOWNLOAD_SPEED_KB
}

fn default_check_time() -> i64 {
    DEFAULT_CHECK_TIME_SECS
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_show_progress() -> bool {
    true
}

fn default_connect_timeout() -> u64 {
    CONNECT_TIMEOUT_SECS
}

fn default_read_timeout() -> u64 {
    READ_TIMEOUT_SECS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[user]
name = "alice"

[server]
url = "http://files.example/"
port = 8080
download_speed = 900

[files]
check_time = 60
ignore_list = ["private/", "tmp"]
download_folder = "/srv/mirror"

[sync]
workers = 3
auth_order = "account-first"
redownload_empty = true
show_progress = false
"#;

    const MINIMAL: &str = r#"
[server]
url = "http://files.example"

[files]
download_folder = "/srv/mirror"
"#;

    #[test]
    fn test_parse_full_settings() {
        let settings = Settings::from_toml_str(FULL).unwrap();
        assert_eq!(settings.account, "alice");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.download_speed_kb, 900);
        assert_eq!(settings.poll_interval_secs, 60);
        assert_eq!(settings.ignore_prefixes, vec!["private/", "tmp"]);
        assert_eq!(settings.download_folder, PathBuf::from("/srv/mirror"));
        assert_eq!(settings.auth_order, AuthOrder::AccountFirst);
        assert!(settings.redownload_empty);
        assert!(!settings.show_progress);
    }

    #[test]
    fn test_parse_minimal_settings_uses_defaults() {
        let settings = Settings::from_toml_str(MINIMAL).unwrap();
        assert_eq!(settings.account, "");
        assert_eq!(settings.port, 80);
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.poll_interval_secs, DEFAULT_CHECK_TIME_SECS);
        assert_eq!(settings.auth_order, AuthOrder::CredentialFirst);
        assert!(!settings.redownload_empty);
        assert!(settings.show_progress);
        assert_eq!(
            settings,
            Settings::new("http://files.example", "/srv/mirror")
        );
    }

    #[test]
    fn test_missing_download_folder_is_fatal() {
        let raw = "[server]\nurl = \"http://files.example\"\n";
        let err = Settings::from_toml_str(raw).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDownloadFolder));
    }

    #[test]
    fn test_empty_download_folder_is_fatal() {
        let raw = "[server]\nurl = \"http://a\"\n[files]\ndownload_folder = \"\"\n";
        let err = Settings::from_toml_str(raw).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDownloadFolder));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let raw = format!("{MINIMAL}\n[sync]\nworkerz = 4\n");
        let err = Settings::from_toml_str(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn test_invalid_server_url_rejected() {
        let raw = "[server]\nurl = \"not a url\"\n[files]\ndownload_folder = \"/x\"\n";
        let err = Settings::from_toml_str(raw).unwrap_err();
        match err {
            ConfigError::InvalidValue { field, .. } => assert_eq!(field, "server.url"),
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let settings = Settings::new("ftp://files.example", "/x");
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue {
                field: "server.url",
                ..
            })
        ));
    }

    #[test]
    fn test_worker_count_range() {
        let mut settings = Settings::new("http://files.example", "/x");
        settings.workers = 0;
        assert!(settings.validate().is_err());
        settings.workers = 101;
        assert!(settings.validate().is_err());
        settings.workers = 100;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_download_speed_rejected() {
        let mut settings = Settings::new("http://files.example", "/x");
        settings.download_speed_kb = 0;
        let msg = settings.validate().unwrap_err().to_string();
        assert!(msg.contains("download_speed"), "got: {msg}");
    }

    #[test]
    fn test_rate_per_worker_divides_aggregate() {
        let mut settings = Settings::new("http://files.example", "/x");
        settings.download_speed_kb = 1000;
        settings.workers = 3;
        assert_eq!(settings.rate_per_worker(), 333_333);

        settings.download_speed_kb = 1;
        settings.workers = 100;
        assert_eq!(settings.rate_per_worker(), 10);
    }

    #[test]
    fn test_poll_interval_below_one_is_single_pass() {
        let mut settings = Settings::new("http://files.example", "/x");
        settings.poll_interval_secs = 0;
        assert_eq!(settings.poll_interval(), None);
        settings.poll_interval_secs = -5;
        assert_eq!(settings.poll_interval(), None);
        settings.poll_interval_secs = 1;
        assert_eq!(settings.poll_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_is_ignored_prefix_match_is_case_sensitive() {
        let mut settings = Settings::new("http://files.example", "/x");
        settings.ignore_prefixes = vec!["secrets/".to_string()];
        assert!(settings.is_ignored("secrets/key"));
        assert!(!settings.is_ignored("Secrets/key"));
        assert!(!settings.is_ignored("public/secrets/key"));
    }

    #[test]
    fn test_timeout_defaults_match_client_defaults() {
        let settings = Settings::from_toml_str(MINIMAL).unwrap();
        assert_eq!(settings.connect_timeout_secs, CONNECT_TIMEOUT_SECS);
        assert_eq!(settings.read_timeout_secs, READ_TIMEOUT_SECS);
        assert_eq!(
            Settings::new("http://files.example", "/x").read_timeout_secs,
            READ_TIMEOUT_SECS
        );
    }

    #[test]
    fn test_base_url_appends_port() {
        let settings = Settings::from_toml_str(FULL).unwrap();
        assert_eq!(settings.base_url(), "http://files.example:8080");
    }

    #[test]
    fn test_from_file_missing_path_is_read_error() {
        let err = Settings::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}

//! Transport capability and the reqwest-backed HTTP client.
//!
//! The downloader only needs one thing from the network: "GET this URL with
//! these credentials and give me the body as a byte stream". [`Transport`] is
//! that seam; [`HttpClient`] is the production implementation.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::{debug, instrument};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::credential::BasicAuth;

/// Response body as an async byte stream.
pub type Body = Pin<Box<dyn AsyncRead + Send>>;

/// Capability to fetch a URL with basic-auth credentials.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues an authenticated GET and returns the body of a successful response.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::HttpStatus`] for any non-2xx status, and a
    /// network or timeout error when the request itself fails.
    async fn fetch(&self, url: &str, auth: &BasicAuth) -> Result<Body, DownloadError>;
}

/// HTTP client for authenticated streaming downloads.
///
/// Created once at startup and shared by every worker, taking advantage of
/// connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// The read timeout applies per read, not to the whole transfer, so slow
    /// throttled downloads of large files are not cut off.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be built.
    #[instrument(level = "debug")]
    pub fn new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpClient {
    #[instrument(skip(self, auth), fields(url = %url))]
    async fn fetch(&self, url: &str, auth: &BasicAuth) -> Result<Body, DownloadError> {
        let (username, password) = auth.pair();
        let response = self
            .client
            .get(url)
            .basic_auth(username, Some(password))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url)
                } else {
                    DownloadError::network(url, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(
                url,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
            ));
        }

        debug!(
            status = status.as_u16(),
            content_length = response.content_length(),
            "response received"
        );

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::pin(StreamReader::new(stream)))
    }
}

fn default_user_agent() -> String {
    format!("hfsync/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{basic_auth, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::AuthOrder;
    use crate::credential::Credential;

    fn auth(order: AuthOrder) -> (BasicAuth, Credential) {
        let credential = Credential::from_host_identity("box", &["aa:bb"]);
        (BasicAuth::new("alice", credential.clone(), order), credential)
    }

    #[tokio::test]
    async fn test_fetch_sends_credential_first_basic_auth() {
        let server = MockServer::start().await;
        let (auth, credential) = auth(AuthOrder::CredentialFirst);
        Mock::given(method("GET"))
            .and(path("/a.txt"))
            .and(basic_auth(credential.as_str(), "alice"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let mut body = client
            .fetch(&format!("{}/a.txt", server.uri()), &auth)
            .await
            .unwrap();
        let mut content = Vec::new();
        body.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"hello");
    }

    #[tokio::test]
    async fn test_fetch_sends_account_first_basic_auth() {
        let server = MockServer::start().await;
        let (auth, credential) = auth(AuthOrder::AccountFirst);
        Mock::given(method("GET"))
            .and(basic_auth("alice", credential.as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        assert!(client.fetch(&server.uri(), &auth).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let (auth, _) = auth(AuthOrder::CredentialFirst);
        let url = format!("{}/locked.bin", server.uri());
        match client.fetch(&url, &auth).await {
            Err(DownloadError::HttpStatus {
                status,
                reason,
                url: err_url,
            }) => {
                assert_eq!(status, 403);
                assert_eq!(reason, "Forbidden");
                assert_eq!(err_url, url);
            }
            Err(other) => panic!("expected HttpStatus, got {other:?}"),
            Ok(_) => panic!("expected HttpStatus, got a body"),
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", default_user_agent().as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let (auth, _) = auth(AuthOrder::CredentialFirst);
        assert!(client.fetch(&server.uri(), &auth).await.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        let client = HttpClient::new_with_timeouts(1, 1).unwrap();
        let (auth, _) = auth(AuthOrder::CredentialFirst);
        let result = client.fetch("http://127.0.0.1:1/a.txt", &auth).await;
        assert!(matches!(
            result,
            Err(DownloadError::Network { .. } | DownloadError::Timeout { .. })
        ));
    }
}

//! HTTP release source backed by the public release bucket

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::ReleaseSource;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::{Error, Result, DEFAULT_RELEASE_BASE_URL};

/// Default per-request timeout for release service calls
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the release service
#[derive(Clone, Debug)]
pub struct ReleaseServiceConfig {
    /// Base URL; `distro/...` paths are appended to it
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryConfig,
}

impl Default for ReleaseServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
            timeout: DEFAULT_RELEASE_TIMEOUT,
            retry: RetryConfig::default(),
        }
    }
}

/// A single failed round trip
#[derive(Debug)]
struct FetchFailure {
    transient: bool,
    message: String,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        Self {
            transient: e.is_timeout() || e.is_connect() || e.is_request(),
            message: e.to_string(),
        }
    }
}

/// Fetches channel indexes and manifests over HTTP
pub struct HttpReleaseSource {
    client: Client,
    config: ReleaseServiceConfig,
}

impl HttpReleaseSource {
    /// Build a source with its own HTTP client
    pub fn new(config: ReleaseServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::channel_lookup(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/distro/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, url: &str) -> std::result::Result<Value, FetchFailure> {
        retry_with_backoff(
            &self.config.retry,
            url,
            |e: &FetchFailure| e.transient,
            || async {
                debug!(url = %url, "Fetching");
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(FetchFailure {
                        transient: is_transient_status(status),
                        message: format!("GET {} returned {}", url, status),
                    });
                }
                let body = response.bytes().await?;
                let value: Value = serde_json::from_slice(&body).map_err(|e| FetchFailure {
                    transient: false,
                    message: format!("invalid JSON from {}: {}", url, e),
                })?;
                Ok::<Value, FetchFailure>(value)
            },
        )
        .await
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn fetch_channels(&self) -> Result<Value> {
        let url = self.url("channels.json");
        self.get_json(&url)
            .await
            .map_err(|e| Error::channel_lookup(e.to_string()))
    }

    async fn fetch_manifest(&self, tag: &str) -> Result<Value> {
        let url = self.url(&format!("{}/manifest.json", tag));
        self.get_json(&url)
            .await
            .map_err(|e| Error::manifest_fetch(tag, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::ReleaseResolver;
    use mockito::Server;

    fn source_for(server: &Server, max_attempts: u32) -> HttpReleaseSource {
        HttpReleaseSource::new(ReleaseServiceConfig {
            base_url: server.url(),
            timeout: Duration::from_secs(5),
            retry: RetryConfig {
                max_attempts,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                backoff_multiplier: 2.0,
            },
        })
        .unwrap()
    }

    #[test]
    fn urls_follow_distro_layout() {
        let source = HttpReleaseSource::new(ReleaseServiceConfig {
            base_url: "https://releases.example.com/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            source.url("channels.json"),
            "https://releases.example.com/distro/channels.json"
        );
        assert_eq!(
            source.url("v3/manifest.json"),
            "https://releases.example.com/distro/v3/manifest.json"
        );
    }

    #[tokio::test]
    async fn resolves_through_both_endpoints() {
        let mut server = Server::new_async().await;
        let channels = server
            .mock("GET", "/distro/channels.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"stable": "v3", "dev": {"master": "v9-abc"}}"#)
            .expect(1)
            .create_async()
            .await;
        let manifest = server
            .mock("GET", "/distro/v9-abc/manifest.json")
            .with_status(200)
            .with_body(r#"{"kubernetes": {"version": "1.3.0"}}"#)
            .expect(1)
            .create_async()
            .await;

        let resolver = ReleaseResolver::new(source_for(&server, 1));
        let release = resolver.resolve("dev").await.unwrap();

        assert_eq!(release.version, "v9-abc");
        assert_eq!(release.manifest["kubernetes"]["version"], "1.3.0");
        channels.assert_async().await;
        manifest.assert_async().await;
    }

    #[tokio::test]
    async fn missing_index_is_channel_lookup_error() {
        let mut server = Server::new_async().await;
        let _channels = server
            .mock("GET", "/distro/channels.json")
            .with_status(404)
            .create_async()
            .await;

        let err = source_for(&server, 3).fetch_channels().await.unwrap_err();
        assert!(matches!(err, Error::ChannelLookup(ref m) if m.contains("404")));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let manifest = server
            .mock("GET", "/distro/v3/manifest.json")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let err = source_for(&server, 3)
            .fetch_manifest("v3")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ManifestFetch { ref tag, .. } if tag == "v3"));
        manifest.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_limit() {
        let mut server = Server::new_async().await;
        let channels = server
            .mock("GET", "/distro/channels.json")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let err = source_for(&server, 3).fetch_channels().await.unwrap_err();
        assert!(matches!(err, Error::ChannelLookup(_)));
        channels.assert_async().await;
    }

    #[tokio::test]
    async fn invalid_json_is_reported_without_retry() {
        let mut server = Server::new_async().await;
        let channels = server
            .mock("GET", "/distro/channels.json")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .expect(1)
            .create_async()
            .await;

        let err = source_for(&server, 3).fetch_channels().await.unwrap_err();
        assert!(matches!(err, Error::ChannelLookup(ref m) if m.contains("invalid JSON")));
        channels.assert_async().await;
    }
}

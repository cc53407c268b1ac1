use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::CoreConfig;
use crate::model::ApiCredential;

/// Key under which the remote store keeps the generative API key.
pub const API_KEY_ENTRY: &str = "api_key";

/// Upstream rate limit for remote config fetches.
pub const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0}")]
    FetchFailed(String),

    #[error("Fetch failed (received API key is null or empty).")]
    EmptyKey,

    #[error("config fetched too recently, retry in {retry_in:?}")]
    Throttled { retry_in: Duration },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Source of the API credential.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn fetch_credential(&self) -> Result<ApiCredential, ConfigError>;
}

#[async_trait]
impl<T: ConfigProvider + ?Sized> ConfigProvider for std::sync::Arc<T> {
    async fn fetch_credential(&self) -> Result<ApiCredential, ConfigError> {
        (**self).fetch_credential().await
    }
}

// ============================================================================
// Refetch throttling
// ============================================================================

#[derive(Default)]
struct FetchState {
    last_attempt: Option<Instant>,
    cached: Option<ApiCredential>,
}

/// Enforces the minimum refetch interval in front of any provider.
///
/// Within the interval the inner provider is not called: the last good
/// credential is served, or `Throttled` when there is none yet. The lock is
/// held across the fetch, so at most one fetch is outstanding.
pub struct ThrottledConfigProvider<P> {
    inner: P,
    min_interval: Duration,
    state: Mutex<FetchState>,
}

impl<P: ConfigProvider> ThrottledConfigProvider<P> {
    pub fn new(inner: P, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval: min_interval.max(MIN_REFETCH_INTERVAL),
            state: Mutex::new(FetchState::default()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[async_trait]
impl<P: ConfigProvider> ConfigProvider for ThrottledConfigProvider<P> {
    #[instrument(skip(self))]
    async fn fetch_credential(&self) -> Result<ApiCredential, ConfigError> {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_attempt {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                return match &state.cached {
                    Some(credential) => {
                        debug!(?elapsed, "Serving cached credential inside refetch interval");
                        Ok(credential.clone())
                    }
                    None => Err(ConfigError::Throttled {
                        retry_in: self.min_interval - elapsed,
                    }),
                };
            }
        }

        state.last_attempt = Some(Instant::now());
        match self.inner.fetch_credential().await {
            Ok(credential) => {
                state.cached = Some(credential.clone());
                Ok(credential)
            }
            Err(e) => {
                warn!(error = %e, "Credential fetch failed");
                Err(e)
            }
        }
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Serves a key known at build or launch time.
#[derive(Debug, Clone)]
pub struct StaticConfigProvider {
    credential: Option<ApiCredential>,
}

impl StaticConfigProvider {
    pub fn new(credential: ApiCredential) -> Self {
        Self {
            credential: Some(credential),
        }
    }

    /// Reads the key from an environment variable; missing or blank yields
    /// `EmptyKey` on fetch.
    pub fn from_env(var: &str) -> Self {
        let credential = std::env::var(var)
            .ok()
            .and_then(|key| ApiCredential::new(key).ok());
        if credential.is_none() {
            warn!(var, "API key not found in environment");
        }
        Self { credential }
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn fetch_credential(&self) -> Result<ApiCredential, ConfigError> {
        self.credential.clone().ok_or(ConfigError::EmptyKey)
    }
}

#[derive(Debug, Deserialize)]
struct RemoteConfigDocument {
    #[serde(default)]
    entries: HashMap<String, String>,
    #[serde(default)]
    state: Option<String>,
}

const STATUS_NOT_RIGHT: &str = "Fetch failed (returned status is not right).";

impl RemoteConfigDocument {
    fn into_credential(mut self) -> Result<ApiCredential, ConfigError> {
        match self.entries.remove(API_KEY_ENTRY) {
            Some(key) => ApiCredential::new(key),
            None => {
                debug!(state = ?self.state, "Remote config has no api key entry");
                Err(ConfigError::FetchFailed(STATUS_NOT_RIGHT.into()))
            }
        }
    }
}

/// Fetches the key from a remote key-value config document:
/// `{"entries": {"api_key": "..."}, "state": "UPDATE"}`.
pub struct RemoteConfigClient {
    http: reqwest::Client,
    url: Url,
}

impl RemoteConfigClient {
    pub fn new(http: reqwest::Client, url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url).map_err(|e| ConfigError::Invalid(format!("{url}: {e}")))?;
        Ok(Self { http, url })
    }

    /// Client for `remote_config_url`; `Invalid` when the URL is not set.
    pub fn from_config(config: &CoreConfig, http: reqwest::Client) -> Result<Self, ConfigError> {
        let url = config
            .remote_config_url
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("remote_config_url is not set".into()))?;
        Self::new(http, url)
    }
}

#[async_trait]
impl ConfigProvider for RemoteConfigClient {
    #[instrument(skip(self), fields(host = self.url.host_str().unwrap_or_default()))]
    async fn fetch_credential(&self) -> Result<ApiCredential, ConfigError> {
        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| ConfigError::FetchFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::FetchFailed(format!(
                "remote config returned HTTP {}",
                status.as_u16()
            )));
        }

        let document: RemoteConfigDocument = response
            .json()
            .await
            .map_err(|e| ConfigError::FetchFailed(e.to_string()))?;

        let credential = document.into_credential()?;
        info!("Remote config fetched");
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ConfigProvider for CountingProvider {
        async fn fetch_credential(&self) -> Result<ApiCredential, ConfigError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(ConfigError::FetchFailed("offline".into()));
            }
            ApiCredential::new(format!("key-{n}"))
        }
    }

    fn counting(fail: bool) -> (ThrottledConfigProvider<CountingProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = ThrottledConfigProvider::new(
            CountingProvider {
                calls: calls.clone(),
                fail,
            },
            MIN_REFETCH_INTERVAL,
        );
        (provider, calls)
    }

    #[tokio::test(start_paused = true)]
    async fn serves_cached_credential_inside_interval() {
        let (provider, calls) = counting(false);

        assert_eq!(provider.fetch_credential().await.unwrap().expose(), "key-1");
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(provider.fetch_credential().await.unwrap().expose(), "key-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(provider.fetch_credential().await.unwrap().expose(), "key-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_is_throttled_until_interval_passes() {
        let (provider, calls) = counting(true);

        assert!(matches!(
            provider.fetch_credential().await,
            Err(ConfigError::FetchFailed(_))
        ));
        tokio::time::advance(Duration::from_secs(8)).await;
        match provider.fetch_credential().await {
            Err(ConfigError::Throttled { retry_in }) => {
                assert_eq!(retry_in, Duration::from_secs(12))
            }
            other => panic!("expected Throttled, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interval_never_drops_below_upstream_limit() {
        let inner = CountingProvider {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        };
        let provider = ThrottledConfigProvider::new(inner, Duration::from_secs(1));
        assert_eq!(provider.min_interval(), MIN_REFETCH_INTERVAL);
    }

    #[tokio::test]
    async fn static_provider_without_key_reports_empty() {
        let provider = StaticConfigProvider::from_env("TRAVEL_CORE_TEST_UNSET_KEY");
        assert_eq!(
            provider.fetch_credential().await.unwrap_err(),
            ConfigError::EmptyKey
        );
    }

    #[tokio::test]
    async fn remote_config_reads_api_key_entry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/config")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"entries":{"api_key":"remote-key","other":"x"},"state":"UPDATE"}"#)
            .create_async()
            .await;

        let client =
            RemoteConfigClient::new(reqwest::Client::new(), &format!("{}/config", server.url()))
                .unwrap();
        let credential = client.fetch_credential().await.unwrap();

        assert_eq!(credential.expose(), "remote-key");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn remote_config_errors() {
        let mut server = mockito::Server::new_async().await;
        let _empty = server
            .mock("GET", "/empty")
            .with_status(200)
            .with_body(r#"{"entries":{"api_key":""}}"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/missing")
            .with_status(200)
            .with_body(r#"{"state":"NO_TEMPLATE"}"#)
            .create_async()
            .await;
        let _down = server
            .mock("GET", "/down")
            .with_status(503)
            .create_async()
            .await;

        let fetch = |path: &str| {
            let client =
                RemoteConfigClient::new(reqwest::Client::new(), &format!("{}{path}", server.url()))
                    .unwrap();
            async move { client.fetch_credential().await }
        };

        assert_eq!(fetch("/empty").await.unwrap_err(), ConfigError::EmptyKey);
        assert_eq!(
            fetch("/missing").await.unwrap_err(),
            ConfigError::FetchFailed(STATUS_NOT_RIGHT.into())
        );
        assert_eq!(
            fetch("/down").await.unwrap_err(),
            ConfigError::FetchFailed("remote config returned HTTP 503".into())
        );
    }

    #[tokio::test]
    async fn remote_config_built_from_core_config() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/remote")
            .with_status(200)
            .with_body(r#"{"entries":{"api_key":"configured-key"}}"#)
            .create_async()
            .await;

        let config = CoreConfig {
            remote_config_url: Some(format!("{}/remote", server.url())),
            ..Default::default()
        };
        let client = RemoteConfigClient::from_config(&config, reqwest::Client::new()).unwrap();

        assert_eq!(client.fetch_credential().await.unwrap().expose(), "configured-key");
        mock.assert_async().await;
    }

    #[test]
    fn remote_config_requires_url_in_core_config() {
        assert!(matches!(
            RemoteConfigClient::from_config(&CoreConfig::default(), reqwest::Client::new()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn remote_config_rejects_bad_url() {
        assert!(matches!(
            RemoteConfigClient::new(reqwest::Client::new(), "not a url"),
            Err(ConfigError::Invalid(_))
        ));
    }
}

//! Upstream HTTP fetcher with a bounded retry state machine.
//!
//! Every request goes through [`Fetcher::fetch`], which retries transient
//! failures (HTTP 502/503/504 and transport errors) with exponential backoff
//! and fails immediately on everything else. The retry budget and backoff
//! schedule are plain functions so they can be tested without a network.

use std::time::Duration;

use sfd_feed_models::QueryParams;

use crate::{Config, FeedError};

/// Additional attempts after the first (3 attempts total).
const MAX_RETRIES: u32 = 2;

/// What the retry loop should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Transient failure — retry if budget remains.
    Retry,
    /// Permanent failure — surface immediately.
    Fail,
}

/// Classifies an HTTP status: only 502/503/504 are retryable.
#[must_use]
pub const fn classify_status(status: u16) -> RetryDecision {
    match status {
        502 | 503 | 504 => RetryDecision::Retry,
        _ => RetryDecision::Fail,
    }
}

/// Classifies a transport error: timeouts and connection-level failures are
/// retryable; anything else (e.g., a malformed request) is not.
#[must_use]
pub fn classify_transport(e: &reqwest::Error) -> RetryDecision {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        RetryDecision::Retry
    } else {
        RetryDecision::Fail
    }
}

/// Backoff before retry attempt `n` (1-based): 1s, 2s, 4s, ...
#[must_use]
pub const fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1))
}

/// Converts an exhausted transport error into the feed error taxonomy.
fn transport_error(e: reqwest::Error) -> FeedError {
    if e.is_timeout() {
        FeedError::UpstreamTimeout
    } else {
        FeedError::UpstreamNetwork(e)
    }
}

/// HTTP client for the upstream incident feed.
///
/// Holds a single pooled [`reqwest::Client`] with the hard connect/read
/// timeouts from [`Config`]. The fetcher never touches the cache.
pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
}

impl Fetcher {
    /// Builds the fetcher from process configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UpstreamNetwork`] if the TLS backend fails to
    /// initialize.
    pub fn new(config: &Config) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .user_agent(concat!("sfd-feed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FeedError::UpstreamNetwork)?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// The full request URL for `params`, without any nonce. Used for
    /// provenance reporting.
    #[must_use]
    pub fn request_url(&self, params: &QueryParams) -> String {
        let query = params
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.base_url)
    }

    /// Issues the upstream GET and returns the parsed JSON body.
    ///
    /// The query is the deterministic sorted serialization of `params`. When
    /// `bypass_cache` is set (the caller skipped the cache layer entirely) a
    /// `_` nonce is appended so intermediate HTTP caches are defeated too;
    /// the nonce is never sent for cache-mediated fetches.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UpstreamHttp`] for non-2xx statuses (502/503/504
    /// only after the retry budget is exhausted), [`FeedError::UpstreamTimeout`]
    /// for connect/read timeouts after retries, [`FeedError::UpstreamNetwork`]
    /// for other transport failures, and [`FeedError::SchemaValidation`] if
    /// the body is not JSON.
    #[allow(clippy::future_not_send)]
    pub async fn fetch(
        &self,
        params: &QueryParams,
        bypass_cache: bool,
    ) -> Result<serde_json::Value, FeedError> {
        let mut pairs: Vec<(String, String)> = params
            .query_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        if bypass_cache {
            pairs.push(("_".to_string(), chrono::Utc::now().timestamp_millis().to_string()));
        }

        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                log::warn!("retry {attempt}/{MAX_RETRIES} in {delay:?}...");
                tokio::time::sleep(delay).await;
            }

            match self.client.get(&self.base_url).query(&pairs).send().await {
                Err(e) => {
                    if classify_transport(&e) == RetryDecision::Retry && attempt < MAX_RETRIES {
                        log::warn!("transient transport error: {e}");
                        attempt += 1;
                        continue;
                    }
                    return Err(transport_error(e));
                }
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<serde_json::Value>().await.map_err(|e| {
                            log::error!("upstream body was not valid JSON: {e}");
                            FeedError::SchemaValidation {
                                path: "$".to_string(),
                            }
                        });
                    }

                    if classify_status(status.as_u16()) == RetryDecision::Retry
                        && attempt < MAX_RETRIES
                    {
                        log::warn!("HTTP {status} (server error)");
                        attempt += 1;
                        continue;
                    }
                    return Err(FeedError::UpstreamHttp {
                        status: status.as_u16(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

    use super::*;

    /// Minimal upstream stub: answers every connection with `response` and
    /// counts the requests served.
    async fn spawn_stub_upstream(response: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    #[tokio::test]
    async fn persistent_503_exhausts_exactly_three_attempts() {
        let (base_url, hits) = spawn_stub_upstream(
            "HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let config = Config {
            base_url,
            ..Config::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();

        let err = fetcher
            .fetch(&QueryParams::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::UpstreamHttp { status: 503 }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_fail_on_the_first_attempt() {
        let (base_url, hits) = spawn_stub_upstream(
            "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await;
        let config = Config {
            base_url,
            ..Config::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();

        let err = fetcher
            .fetch(&QueryParams::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::UpstreamHttp { status: 404 }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn gateway_errors_are_retryable() {
        assert_eq!(classify_status(502), RetryDecision::Retry);
        assert_eq!(classify_status(503), RetryDecision::Retry);
        assert_eq!(classify_status(504), RetryDecision::Retry);
    }

    #[test]
    fn other_statuses_fail_immediately() {
        assert_eq!(classify_status(400), RetryDecision::Fail);
        assert_eq!(classify_status(404), RetryDecision::Fail);
        assert_eq!(classify_status(429), RetryDecision::Fail);
        assert_eq!(classify_status(500), RetryDecision::Fail);
        assert_eq!(classify_status(501), RetryDecision::Fail);
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
    }

    #[test]
    fn request_url_uses_sorted_params_without_nonce() {
        let fetcher = Fetcher::new(&Config::default()).unwrap();
        let url = fetcher.request_url(&QueryParams::default());
        assert!(url.starts_with("https://sfdlive.com/api/incidents?area=Any&date=Today"));
        assert!(url.contains("draw=1"));
        assert!(!url.contains("_="));
    }
}

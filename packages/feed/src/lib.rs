#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fetch, cache, and normalization pipeline for the Seattle Fire Department
//! live incident feed.
//!
//! The pipeline is: [`fetcher::Fetcher`] issues the upstream request with
//! retry, [`normalize::normalize_response`] converts the raw JSON into
//! canonical [`sfd_feed_models::Incident`] records, and [`cache::FeedCache`]
//! keys the normalized result by the canonical query serialization with a
//! per-entry TTL and per-key single-flight.

pub mod cache;
pub mod fetcher;
pub mod normalize;

use std::time::Duration;

/// Errors that can occur while fetching or normalizing feed data.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Upstream returned a non-2xx status (after retries, where retryable).
    #[error("upstream returned HTTP {status}")]
    UpstreamHttp {
        /// The HTTP status code.
        status: u16,
    },

    /// Connect or read timeout, after the retry budget was exhausted.
    #[error("upstream request timed out")]
    UpstreamTimeout,

    /// Transport-level failure (DNS, connection reset, TLS, ...).
    #[error("upstream network error: {0}")]
    UpstreamNetwork(reqwest::Error),

    /// Normalization could not coerce a required field to its canonical type.
    #[error("schema validation failed at {path}")]
    SchemaValidation {
        /// Path of the first field that failed coercion.
        path: String,
    },

    /// The upstream responded successfully but with zero incidents where at
    /// least one was required.
    #[error("no incidents available")]
    NoData,
}

impl FeedError {
    /// Stable machine-readable code for the tool boundary.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UpstreamHttp { .. } => "UPSTREAM_HTTP_ERROR",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamNetwork(_) => "UPSTREAM_NETWORK_ERROR",
            Self::SchemaValidation { .. } => "SCHEMA_VALIDATION_ERROR",
            Self::NoData => "NO_DATA",
        }
    }
}

/// Process-wide configuration, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream feed base URL.
    pub base_url: String,
    /// Default cache TTL applied when a query does not specify one.
    pub default_cache_ttl: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Read timeout for the full response.
    pub read_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "https://sfdlive.com/api/incidents".to_string(),
            default_cache_ttl: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(7),
        }
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `SFD_BASE_URL`, `DEFAULT_CACHE_TTL` (seconds),
    /// `HTTP_CONNECT_TIMEOUT_SECS`, `HTTP_READ_TIMEOUT_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("SFD_BASE_URL").unwrap_or(defaults.base_url),
            default_cache_ttl: env_secs("DEFAULT_CACHE_TTL", defaults.default_cache_ttl),
            connect_timeout: env_secs("HTTP_CONNECT_TIMEOUT_SECS", defaults.connect_timeout),
            read_timeout: env_secs("HTTP_READ_TIMEOUT_SECS", defaults.read_timeout),
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map_or(default, Duration::from_secs)
}

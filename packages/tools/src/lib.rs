#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query orchestration over the feed pipeline.
//!
//! [`SfdTools`] owns the HTTP fetcher and the response cache, composes
//! fetch + normalize behind the cache's single-flight, and exposes one
//! method per tool. The classification tools fetch a widened page so the
//! lookback window is covered even when the default page would truncate it.

use std::time::Duration;

use chrono::Utc;
use sfd_classify::{EvacuationOrders, FireActivity};
use sfd_feed::cache::{FeedCache, FetchOutcome};
use sfd_feed::fetcher::Fetcher;
use sfd_feed::normalize::normalize_response;
use sfd_feed::{Config, FeedError};
use sfd_feed_models::{Incident, Order, QueryParams, ResponseSource};
use sfd_tools_models::{
    ActiveIncidentSummary, ActiveIncidentsInput, ActiveIncidentsResponse, FetchRawInput,
    FetchRawResponse, HasEvacuationOrdersInput, IsFireActiveInput, LatestIncidentResponse,
    ToolName,
};

/// Page size for `latest_incident`: small, but enough to tolerate upstream
/// ordering quirks.
const LATEST_PAGE_LENGTH: u32 = 10;

/// Widened page size shared by the classification tools, so lookback windows
/// of several hours are covered on busy days.
const CLASSIFY_PAGE_LENGTH: u32 = 200;

/// Cache TTL for the widened classification page.
const CLASSIFY_PAGE_TTL: Duration = Duration::from_secs(30);

/// Selects the incident with the maximum `datetime_utc`, breaking exact
/// timestamp ties by the larger upstream `id`.
#[must_use]
pub fn select_latest(incidents: &[Incident]) -> Option<&Incident> {
    incidents
        .iter()
        .max_by_key(|incident| (incident.datetime_utc, incident.id))
}

/// Reduces a page to lightweight summaries of the incidents the upstream
/// marks active, preserving order.
#[must_use]
pub fn summarize_active(incidents: &[Incident]) -> Vec<ActiveIncidentSummary> {
    incidents
        .iter()
        .filter(|incident| incident.active)
        .map(ActiveIncidentSummary::from)
        .collect()
}

/// Entry point for all tool execution.
pub struct SfdTools {
    config: Config,
    fetcher: Fetcher,
    cache: FeedCache,
}

impl SfdTools {
    /// Builds the orchestrator from process configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UpstreamNetwork`] if the HTTP client fails to
    /// initialize.
    pub fn new(config: Config) -> Result<Self, FeedError> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self {
            config,
            fetcher,
            cache: FeedCache::new(),
        })
    }

    /// Fetches a page through the cache, normalizing on miss.
    async fn fetch_cached(
        &self,
        params: &QueryParams,
        ttl: Duration,
    ) -> Result<FetchOutcome, FeedError> {
        self.cache
            .get_or_fetch(params, ttl, || async {
                let body = self.fetcher.fetch(params, false).await?;
                normalize_response(&body)
            })
            .await
    }

    /// Fetches a page honoring the TTL contract: zero skips the cache in
    /// both directions and sends the cache-defeating nonce upstream.
    async fn fetch_with_ttl(
        &self,
        params: &QueryParams,
        ttl: Duration,
    ) -> Result<FetchOutcome, FeedError> {
        if ttl.is_zero() {
            let body = self.fetcher.fetch(params, true).await?;
            let (meta, incidents) = normalize_response(&body)?;
            return Ok(FetchOutcome {
                meta,
                incidents,
                cache_hit: false,
                fetched_at: Utc::now(),
            });
        }
        self.fetch_cached(params, ttl).await
    }

    fn source(&self, params: &QueryParams, outcome: &FetchOutcome) -> ResponseSource {
        ResponseSource {
            url: self.fetcher.request_url(params),
            fetched_at: outcome.fetched_at,
            cache_hit: outcome.cache_hit,
        }
    }

    /// Low-level normalized fetch with caller-controlled filters and TTL.
    ///
    /// A TTL of zero skips the cache in both directions: nothing is read,
    /// nothing is stored, and the upstream request carries a nonce to defeat
    /// intermediate HTTP caches.
    ///
    /// # Errors
    ///
    /// Propagates any [`FeedError`] from the fetch or normalization.
    pub async fn fetch_raw(&self, input: &FetchRawInput) -> Result<FetchRawResponse, FeedError> {
        let params = input.params.clone().clamped();
        let ttl = input
            .cache_ttl_seconds
            .map_or(self.config.default_cache_ttl, Duration::from_secs);
        let outcome = self.fetch_with_ttl(&params, ttl).await?;

        let source = self.source(&params, &outcome);
        Ok(FetchRawResponse {
            meta: outcome.meta,
            incidents: outcome.incidents,
            source,
        })
    }

    /// Snapshot of the incidents the upstream currently marks active, as
    /// lightweight summaries over today's default page.
    ///
    /// # Errors
    ///
    /// Propagates any [`FeedError`] from the fetch or normalization.
    pub async fn active_incidents(
        &self,
        input: &ActiveIncidentsInput,
    ) -> Result<ActiveIncidentsResponse, FeedError> {
        let params = QueryParams::default();
        let ttl = input
            .cache_ttl_seconds
            .map_or(self.config.default_cache_ttl, Duration::from_secs);
        let outcome = self.fetch_with_ttl(&params, ttl).await?;

        let incidents = summarize_active(&outcome.incidents);
        let source = self.source(&params, &outcome);
        Ok(ActiveIncidentsResponse {
            count: incidents.len(),
            incidents,
            source,
        })
    }

    /// The single most recent incident, selected by timestamp rather than
    /// trusting upstream ordering.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::NoData`] when the feed has no incidents for
    /// today, and propagates any fetch or normalization error.
    pub async fn latest_incident(&self) -> Result<LatestIncidentResponse, FeedError> {
        let params = QueryParams {
            order: Order::New,
            length: LATEST_PAGE_LENGTH,
            ..QueryParams::default()
        };
        let outcome = self
            .fetch_cached(&params, self.config.default_cache_ttl)
            .await?;

        let incident = select_latest(&outcome.incidents)
            .cloned()
            .ok_or(FeedError::NoData)?;
        let source = self.source(&params, &outcome);
        Ok(LatestIncidentResponse { incident, source })
    }

    /// The widened page both classification tools run over.
    async fn classify_page(&self) -> Result<FetchOutcome, FeedError> {
        let params = QueryParams {
            order: Order::New,
            length: CLASSIFY_PAGE_LENGTH,
            ..QueryParams::default()
        };
        self.fetch_cached(&params, CLASSIFY_PAGE_TTL).await
    }

    /// Whether any fire incident is currently active.
    ///
    /// # Errors
    ///
    /// Propagates any [`FeedError`] from the underlying fetch.
    pub async fn is_fire_active(&self, input: &IsFireActiveInput) -> Result<FireActivity, FeedError> {
        let lookback = input.clamped_lookback();
        let outcome = self.classify_page().await?;
        Ok(sfd_classify::is_fire_active(
            &outcome.incidents,
            Utc::now(),
            lookback,
        ))
    }

    /// Whether recent incident text mentions evacuation orders.
    ///
    /// # Errors
    ///
    /// Propagates any [`FeedError`] from the underlying fetch.
    pub async fn has_evacuation_orders(
        &self,
        input: &HasEvacuationOrdersInput,
    ) -> Result<EvacuationOrders, FeedError> {
        let lookback = input.clamped_lookback();
        let outcome = self.classify_page().await?;
        Ok(sfd_classify::has_evacuation_orders(
            &outcome.incidents,
            Utc::now(),
            lookback,
        ))
    }

    /// Dispatches a tool invocation by name with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::SchemaValidation`] when `arguments` does not
    /// deserialize into the tool's input type, and otherwise propagates the
    /// tool's own error.
    pub async fn execute(
        &self,
        name: ToolName,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, FeedError> {
        log::info!("executing tool {name}");
        let result = match name {
            ToolName::FetchRaw => {
                let input = parse_arguments(arguments)?;
                serde_json::to_value(self.fetch_raw(&input).await?)
            }
            ToolName::ActiveIncidents => {
                let input = parse_arguments(arguments)?;
                serde_json::to_value(self.active_incidents(&input).await?)
            }
            ToolName::LatestIncident => serde_json::to_value(self.latest_incident().await?),
            ToolName::IsFireActive => {
                let input = parse_arguments(arguments)?;
                serde_json::to_value(self.is_fire_active(&input).await?)
            }
            ToolName::HasEvacuationOrders => {
                let input = parse_arguments(arguments)?;
                serde_json::to_value(self.has_evacuation_orders(&input).await?)
            }
        };
        result.map_err(|e| {
            log::error!("tool result failed to serialize: {e}");
            FeedError::SchemaValidation {
                path: "$".to_string(),
            }
        })
    }
}

/// Deserializes tool arguments, treating a JSON `null` as "no arguments".
fn parse_arguments<T>(arguments: serde_json::Value) -> Result<T, FeedError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if arguments.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(arguments).map_err(|e| {
        log::warn!("invalid tool arguments: {e}");
        FeedError::SchemaValidation {
            path: "arguments".to_string(),
        }
    })
}

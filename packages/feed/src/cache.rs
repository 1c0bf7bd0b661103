//! Process-wide response cache with per-key TTL and single-flight.
//!
//! Entries are keyed by the canonical query serialization
//! ([`QueryParams::cache_key`]) and hold the *normalized* result of a fetch.
//! Expiry is lazy: an entry past its TTL is treated as absent on the next
//! lookup and overwritten after the re-fetch. There is no eviction and no
//! background sweeping — the parameter space is bounded in practice.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sfd_feed_models::{Incident, QueryParams, ResponseMeta};

use crate::FeedError;

/// One cached normalized response.
///
/// Created on a cache miss immediately after a successful fetch+normalize
/// and read-only afterward. The TTL supplied by the *storing* call governs
/// the entry for its whole lifetime — later callers with a different TTL do
/// not extend or shorten it.
struct CacheEntry {
    meta: ResponseMeta,
    incidents: Vec<Incident>,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        // A clock that went backwards reads as not expired.
        (now - self.fetched_at).to_std().is_ok_and(|elapsed| elapsed > self.ttl)
    }
}

/// Result of a cache-mediated fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Envelope metadata from the (possibly cached) upstream response.
    pub meta: ResponseMeta,
    /// Normalized incidents.
    pub incidents: Vec<Incident>,
    /// Whether the result came from a live cache entry.
    pub cache_hit: bool,
    /// When the underlying data was fetched from upstream.
    pub fetched_at: DateTime<Utc>,
}

type Slot = Arc<tokio::sync::Mutex<Option<CacheEntry>>>;

/// In-memory cache for normalized feed responses.
///
/// The outer map is guarded by a short-lived `std::sync::Mutex`; each key
/// owns an async mutex that is held across the upstream fetch, so at most
/// one fetch per key is in flight at any time. Concurrent callers for the
/// same key await that fetch and then read the fresh entry; callers for
/// different keys never contend. A fetch that errors (including a timeout)
/// releases the per-key lock on return.
#[derive(Default)]
pub struct FeedCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl FeedCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().expect("feed cache mutex poisoned");
        slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    /// Returns a live cached result for `params`, or invokes `fetch_fn`
    /// (the Fetcher+Normalizer composition), stores its result with `ttl`,
    /// and returns it with `cache_hit = false`.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`FeedError`] `fetch_fn` fails with; nothing is
    /// cached in that case.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        params: &QueryParams,
        ttl: Duration,
        fetch_fn: F,
    ) -> Result<FetchOutcome, FeedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(ResponseMeta, Vec<Incident>), FeedError>>,
    {
        let key = params.cache_key();
        let slot = self.slot(&key);
        let mut guard = slot.lock().await;

        let now = Utc::now();
        if let Some(entry) = guard.as_ref()
            && !entry.is_expired(now)
        {
            log::debug!("cache hit for {key}");
            return Ok(FetchOutcome {
                meta: entry.meta.clone(),
                incidents: entry.incidents.clone(),
                cache_hit: true,
                fetched_at: entry.fetched_at,
            });
        }

        log::debug!("cache miss for {key}, fetching upstream");
        let (meta, incidents) = fetch_fn().await?;
        let fetched_at = Utc::now();
        *guard = Some(CacheEntry {
            meta: meta.clone(),
            incidents: incidents.clone(),
            fetched_at,
            ttl,
        });

        Ok(FetchOutcome {
            meta,
            incidents,
            cache_hit: false,
            fetched_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn stub_result() -> (ResponseMeta, Vec<Incident>) {
        (ResponseMeta::default(), Vec::new())
    }

    #[tokio::test]
    async fn first_call_misses_second_call_hits() {
        let cache = FeedCache::new();
        let params = QueryParams::default();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_fetch(&params, Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(stub_result())
            })
            .await
            .unwrap();
        assert!(!first.cache_hit);

        let second = cache
            .get_or_fetch(&params, Duration::from_secs(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(stub_result())
            })
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.fetched_at, first.fetched_at);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let cache = FeedCache::new();
        let params = QueryParams::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let outcome = cache
                .get_or_fetch(&params, Duration::ZERO, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(stub_result())
                })
                .await
                .unwrap();
            assert!(!outcome.cache_hit);
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let cache = FeedCache::new();
        let params = QueryParams::default();

        let err = cache
            .get_or_fetch(&params, Duration::from_secs(60), || async {
                Err(FeedError::UpstreamHttp { status: 503 })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::UpstreamHttp { status: 503 }));

        // The slot was released and stayed empty, so the next call fetches.
        let outcome = cache
            .get_or_fetch(&params, Duration::from_secs(60), || async {
                Ok(stub_result())
            })
            .await
            .unwrap();
        assert!(!outcome.cache_hit);
    }

    #[tokio::test]
    async fn concurrent_callers_share_a_single_fetch() {
        let cache = Arc::new(FeedCache::new());
        let params = QueryParams::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_fetch = {
            let calls = Arc::clone(&calls);
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(stub_result())
                }
            }
        };

        let a = {
            let cache = Arc::clone(&cache);
            let params = params.clone();
            let fetch = slow_fetch.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(&params, Duration::from_secs(60), fetch)
                    .await
                    .unwrap()
            })
        };
        // Give the first task time to take the per-key lock.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let b = {
            let cache = Arc::clone(&cache);
            let params = params.clone();
            let fetch = slow_fetch;
            tokio::spawn(async move {
                cache
                    .get_or_fetch(&params, Duration::from_secs(60), fetch)
                    .await
                    .unwrap()
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!a.cache_hit);
        assert!(b.cache_hit);
    }

    #[tokio::test]
    async fn different_keys_fetch_independently() {
        let cache = FeedCache::new();
        let calls = AtomicUsize::new(0);

        let narrow = QueryParams {
            length: 10,
            ..QueryParams::default()
        };
        let wide = QueryParams {
            length: 200,
            ..QueryParams::default()
        };

        for params in [&narrow, &wide] {
            let outcome = cache
                .get_or_fetch(params, Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(stub_result())
                })
                .await
                .unwrap();
            assert!(!outcome.cache_hit);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

//! Cache of OIDC discovery documents and JSON Web Key Sets.
//!
//! Documents and key sets live in two tables sharing one keyspace: the
//! discovery URI. Reads return a fresh entry without touching the network;
//! anything else triggers a fetch whose result replaces the entry wholesale.
//! Concurrent callers missing on the same key each fetch independently and the
//! last write wins.
//!
//! Stale entries are not removed on read. [`DiscoveryCache::run_eviction_loop`]
//! periodically drops entries that expired more than a grace window ago.

use std::{
    fmt,
    sync::{Arc, RwLock},
    time::{Duration, SystemTime},
};

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    cache::{CacheEntry, CacheStats, CacheTable, SweepStats},
    clock::{Clock, SystemClock},
    config::DiscoveryOptions,
    document::{DiscoveryDocument, JsonWebKeySet},
    error::DiscoveryError,
    fetch::{HttpFetcher, ReqwestFetcher},
};

/// Fetches and caches discovery documents and key sets by discovery URI.
///
/// Share one instance (usually behind an [`Arc`]) between every caller that
/// validates tokens for the same providers.
pub struct DiscoveryCache {
    default_uri: RwLock<Option<String>>,
    default_ttl: Duration,
    eviction_interval: Duration,
    eviction_grace: Duration,
    documents: CacheTable<DiscoveryDocument>,
    key_sets: CacheTable<JsonWebKeySet>,
    fetcher: Arc<dyn HttpFetcher>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryCache")
            .field("default_uri", &self.default_uri())
            .field("default_ttl", &self.default_ttl)
            .field("eviction_interval", &self.eviction_interval)
            .field("eviction_grace", &self.eviction_grace)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl DiscoveryCache {
    /// Creates a cache that fetches over HTTPS with `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Transport`] if the HTTP client cannot be built.
    pub fn new(options: DiscoveryOptions) -> Result<Self, DiscoveryError> {
        let fetcher = ReqwestFetcher::from_options(&options)?;
        Ok(Self::with_fetcher(options, Arc::new(fetcher)))
    }

    /// Creates a cache on top of a caller-supplied transport.
    #[must_use]
    pub fn with_fetcher(options: DiscoveryOptions, fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self {
            default_uri: RwLock::new(options.default_uri),
            default_ttl: options.default_ttl,
            eviction_interval: options.eviction_interval,
            eviction_grace: options.eviction_grace,
            documents: CacheTable::new(),
            key_sets: CacheTable::new(),
            fetcher,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the time source used for expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The URI used when callers omit one.
    pub fn default_uri(&self) -> Option<String> {
        self.default_uri.read().map_or(None, |uri| uri.clone())
    }

    /// Replaces the default URI for subsequent calls. Cached entries are kept.
    pub fn set_default_uri(&self, uri: impl Into<String>) {
        let uri = uri.into();
        if let Ok(mut default_uri) = self.default_uri.write() {
            info!(uri = %uri, "Default discovery URI changed");
            *default_uri = Some(uri);
        }
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the discovery document for `uri`, or for the default URI.
    ///
    /// A fresh cached document is returned as is unless `force_refresh` is set.
    /// Otherwise the document is fetched and cached for `expires_in`, falling
    /// back to the configured default lifetime. A failed fetch never returns a
    /// stale document.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::Configuration`] if no URI can be resolved
    /// - [`DiscoveryError::DiscoveryFetch`] on a non-success status
    /// - [`DiscoveryError::DiscoveryDecode`] if the body is not a discovery document
    /// - [`DiscoveryError::Transport`] if the request itself fails
    pub async fn get_discovery(
        &self,
        uri: Option<&str>,
        expires_in: Option<Duration>,
        force_refresh: bool,
    ) -> Result<Arc<DiscoveryDocument>, DiscoveryError> {
        let uri = self.resolve_uri(uri)?;

        if !force_refresh {
            if let Some(document) = self.documents.get_fresh(&uri, self.clock.now()) {
                debug!(uri = %uri, "Using cached discovery document");
                return Ok(document);
            }
        }

        info!(uri = %uri, force_refresh, "Fetching discovery document");
        let document: DiscoveryDocument = self
            .fetch_json(
                &uri,
                |status, uri| DiscoveryError::DiscoveryFetch { status, uri },
                |source, uri| DiscoveryError::DiscoveryDecode { uri, source },
            )
            .await?;

        let document = Arc::new(document);
        self.store(&self.documents, &uri, Arc::clone(&document), expires_in);
        Ok(document)
    }

    /// Returns the key set published at the `jwks_uri` of the discovery
    /// document for `uri`, or for the default URI.
    ///
    /// The key set is cached under the discovery URI. `force_refresh` refetches
    /// the key set only; the discovery document follows normal freshness rules.
    ///
    /// # Errors
    ///
    /// Any error of [`get_discovery`](Self::get_discovery), plus
    /// - [`DiscoveryError::MissingJwksUri`] if the document names no key set
    /// - [`DiscoveryError::KeysFetch`] on a non-success status from the key set endpoint
    /// - [`DiscoveryError::KeysDecode`] if the body is not a key set
    pub async fn get_discovery_keys(
        &self,
        uri: Option<&str>,
        expires_in: Option<Duration>,
        force_refresh: bool,
    ) -> Result<Arc<JsonWebKeySet>, DiscoveryError> {
        let uri = self.resolve_uri(uri)?;

        if !force_refresh {
            if let Some(keys) = self.key_sets.get_fresh(&uri, self.clock.now()) {
                debug!(uri = %uri, "Using cached JWKS");
                return Ok(keys);
            }
        }

        let document = self.get_discovery(Some(&uri), expires_in, false).await?;
        let jwks_uri = document
            .jwks_uri
            .as_deref()
            .ok_or_else(|| DiscoveryError::MissingJwksUri { uri: uri.clone() })?;

        info!(uri = %uri, jwks_uri, force_refresh, "Fetching JWKS");
        let keys: JsonWebKeySet = self
            .fetch_json(
                jwks_uri,
                |status, uri| DiscoveryError::KeysFetch { status, uri },
                |source, uri| DiscoveryError::KeysDecode { uri, source },
            )
            .await?;
        debug!(uri = %uri, key_count = keys.keys.len(), "Fetched JWKS");

        let keys = Arc::new(keys);
        self.store(&self.key_sets, &uri, Arc::clone(&keys), expires_in);
        Ok(keys)
    }

    /// Drops both cached entries for `uri`.
    pub fn invalidate(&self, uri: &str) {
        self.documents.remove(uri);
        self.key_sets.remove(uri);
        debug!(uri, "Invalidated cached discovery data");
    }

    pub fn clear(&self) {
        self.documents.clear();
        self.key_sets.clear();
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            discovery_entries: self.documents.len(),
            key_set_entries: self.key_sets.len(),
        }
    }

    /// Time since the key set cached for `uri` (or the default URI) was
    /// fetched, fresh or not. `None` when nothing is cached.
    #[must_use]
    pub fn key_set_age(&self, uri: Option<&str>) -> Option<Duration> {
        let uri = self.resolve_uri(uri).ok()?;
        let entry = self.key_sets.get(&uri)?;
        Some(
            self.clock
                .now()
                .duration_since(entry.stored_at())
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Removes entries that expired more than the grace window ago.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Clock`] if the eviction threshold cannot be computed.
    pub fn sweep(&self) -> Result<SweepStats, DiscoveryError> {
        let threshold = self.eviction_threshold()?;
        Ok(SweepStats {
            discovery_evicted: self.documents.evict_older_than(threshold),
            key_sets_evicted: self.key_sets.evict_older_than(threshold),
        })
    }

    /// Sweeps stale entries every eviction interval until `cancel` fires.
    ///
    /// Cancellation is checked around the sleep and around each table's sweep.
    /// Sweep failures are logged and the loop carries on.
    ///
    /// # Errors
    ///
    /// Always ends with [`DiscoveryError::Cancelled`] once `cancel` fires.
    pub async fn run_eviction_loop(&self, cancel: CancellationToken) -> Result<(), DiscoveryError> {
        info!(
            interval_secs = self.eviction_interval.as_secs(),
            grace_secs = self.eviction_grace.as_secs(),
            "Discovery eviction loop started"
        );

        loop {
            check_cancelled(&cancel)?;
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(self.eviction_interval) => {}
            }
            check_cancelled(&cancel)?;

            let threshold = match self.eviction_threshold() {
                Ok(threshold) => threshold,
                Err(e) => {
                    error!(error = %e, "Discovery eviction sweep failed");
                    continue;
                }
            };

            let discovery_evicted = self.documents.evict_older_than(threshold);
            check_cancelled(&cancel)?;
            let key_sets_evicted = self.key_sets.evict_older_than(threshold);
            check_cancelled(&cancel)?;

            if discovery_evicted + key_sets_evicted > 0 {
                info!(discovery_evicted, key_sets_evicted, "Evicted stale discovery data");
            } else {
                debug!("Discovery eviction sweep found nothing to evict");
            }
        }
    }

    fn resolve_uri(&self, uri: Option<&str>) -> Result<String, DiscoveryError> {
        match uri.map(str::trim).filter(|u| !u.is_empty()) {
            Some(uri) => Ok(uri.to_string()),
            None => self
                .default_uri()
                .filter(|u| !u.trim().is_empty())
                .ok_or(DiscoveryError::Configuration),
        }
    }

    fn eviction_threshold(&self) -> Result<SystemTime, DiscoveryError> {
        self.clock
            .now()
            .checked_sub(self.eviction_grace)
            .ok_or_else(|| {
                DiscoveryError::Clock(format!(
                    "cannot subtract grace window of {}s from current time",
                    self.eviction_grace.as_secs()
                ))
            })
    }

    async fn fetch_json<T, S, D>(
        &self,
        uri: &str,
        status_error: S,
        decode_error: D,
    ) -> Result<T, DiscoveryError>
    where
        T: DeserializeOwned,
        S: FnOnce(u16, String) -> DiscoveryError,
        D: FnOnce(serde_json::Error, String) -> DiscoveryError,
    {
        let response = self.fetcher.get(uri).await?;
        if !response.is_success() {
            warn!(uri, status = response.status, "Endpoint returned error status");
            return Err(status_error(response.status, uri.to_string()));
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            warn!(uri, error = %e, "Failed to decode response body");
            decode_error(e, uri.to_string())
        })
    }

    /// Caching is best-effort: a value whose expiry cannot be represented is
    /// returned to the caller without being stored.
    fn store<T>(
        &self,
        table: &CacheTable<T>,
        uri: &str,
        value: Arc<T>,
        expires_in: Option<Duration>,
    ) {
        let ttl = expires_in.unwrap_or(self.default_ttl);
        let now = self.clock.now();
        match now.checked_add(ttl) {
            Some(expires_at) => table.insert(uri, CacheEntry::new(value, now, expires_at)),
            None => warn!(uri, ttl_secs = ttl.as_secs(), "Expiry out of range, value not cached"),
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), DiscoveryError> {
    if cancel.is_cancelled() {
        info!("Discovery eviction loop cancelled");
        return Err(DiscoveryError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        test_support::{ScriptedFetcher, DISCOVERY_URI, JWKS_URI},
    };
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(3600);

    fn cache_with(fetcher: &Arc<ScriptedFetcher>, clock: &ManualClock) -> DiscoveryCache {
        let options = DiscoveryOptions::default()
            .with_default_ttl(TTL)
            .with_eviction(Duration::from_secs(60), Duration::from_secs(600));
        DiscoveryCache::with_fetcher(options, Arc::clone(fetcher) as Arc<dyn HttpFetcher>)
            .with_clock(Arc::new(clock.clone()))
    }

    fn setup() -> (Arc<ScriptedFetcher>, ManualClock, DiscoveryCache) {
        let fetcher = Arc::new(ScriptedFetcher::with_idp());
        let clock = ManualClock::default();
        let cache = cache_with(&fetcher, &clock);
        (fetcher, clock, cache)
    }

    #[tokio::test]
    async fn test_fresh_document_served_from_cache() {
        let (fetcher, clock, cache) = setup();

        let first = cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();
        clock.advance(TTL - Duration::from_secs(1));
        let second = cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.issuer.as_deref(), Some("https://idp.example"));
        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 1);
    }

    #[tokio::test]
    async fn test_expired_document_refetched_with_new_expiry() {
        let (fetcher, clock, cache) = setup();

        cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();
        clock.advance(TTL);
        let refetched_at = clock.now();
        cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();

        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 2);
        let entry = cache.documents.get(DISCOVERY_URI).unwrap();
        assert_eq!(entry.expires_at(), refetched_at + TTL);
    }

    #[tokio::test]
    async fn test_expiry_override() {
        let (fetcher, clock, cache) = setup();
        let short = Duration::from_secs(30);

        cache.get_discovery(Some(DISCOVERY_URI), Some(short), false).await.unwrap();
        clock.advance(short);
        cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();

        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_always_fetches() {
        let (fetcher, _clock, cache) = setup();

        let first = cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();
        let second = cache.get_discovery(Some(DISCOVERY_URI), None, true).await.unwrap();

        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_uri_without_default_is_configuration_error() {
        let (_fetcher, _clock, cache) = setup();

        let err = cache.get_discovery(None, None, false).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Configuration));

        let err = cache.get_discovery_keys(Some("  "), None, false).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Configuration));
    }

    #[tokio::test]
    async fn test_default_uri_fallback_and_replacement() {
        let (fetcher, _clock, cache) = setup();
        let other = "https://other.example/.well-known/openid-configuration";
        fetcher.route_json(other, 200, &json!({ "issuer": "https://other.example" }));

        cache.set_default_uri(DISCOVERY_URI);
        let doc = cache.get_discovery(None, None, false).await.unwrap();
        assert_eq!(doc.issuer.as_deref(), Some("https://idp.example"));

        cache.set_default_uri(other);
        let doc = cache.get_discovery(None, None, false).await.unwrap();
        assert_eq!(doc.issuer.as_deref(), Some("https://other.example"));

        // The previous default's entry is still cached.
        cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();
        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 1);
        assert_eq!(cache.stats().discovery_entries, 2);
    }

    #[tokio::test]
    async fn test_error_status_carries_status_and_uri_and_caches_nothing() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.route_raw(DISCOVERY_URI, 500, "boom");
        let cache = cache_with(&fetcher, &ManualClock::default());

        let err = cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap_err();

        match err {
            DiscoveryError::DiscoveryFetch { status, uri } => {
                assert_eq!(status, 500);
                assert_eq!(uri, DISCOVERY_URI);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_failed_refresh_does_not_serve_stale_document() {
        let (fetcher, clock, cache) = setup();

        cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();
        clock.advance(TTL + Duration::from_secs(1));
        fetcher.route_raw(DISCOVERY_URI, 503, "");

        let err = cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap_err();
        assert_eq!(err.status(), Some(503));

        let err = cache.get_discovery(Some(DISCOVERY_URI), None, true).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.route_raw(DISCOVERY_URI, 200, "<html>not json</html>");
        let cache = cache_with(&fetcher, &ManualClock::default());

        let err = cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::DiscoveryDecode { .. }));
        assert_eq!(err.uri(), Some(DISCOVERY_URI));
        assert_eq!(cache.stats().discovery_entries, 0);
    }

    #[tokio::test]
    async fn test_keys_resolved_through_discovery_and_cached() {
        let (fetcher, _clock, cache) = setup();

        let first = cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();
        assert_eq!(first.jwks_uri.as_deref(), Some(JWKS_URI));
        let again = cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let keys = cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        assert_eq!(keys.keys.len(), 1);
        assert_eq!(keys.keys[0].kid.as_deref(), Some("k1"));
        assert_eq!(keys.keys[0].e.as_deref(), Some("AQAB"));

        let cached = cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        assert!(Arc::ptr_eq(&keys, &cached));

        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 1);
        assert_eq!(fetcher.calls_to(JWKS_URI), 1);
        assert_eq!(cache.stats().key_set_entries, 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_expiry_returns_value_uncached() {
        let (fetcher, _clock, cache) = setup();

        for _ in 0..2 {
            let keys = cache
                .get_discovery_keys(Some(DISCOVERY_URI), Some(Duration::MAX), false)
                .await
                .unwrap();
            assert_eq!(keys.keys.len(), 1);
            assert_eq!(cache.stats(), CacheStats::default());
        }

        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 2);
        assert_eq!(fetcher.calls_to(JWKS_URI), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_leave_one_entry_per_table() {
        let (fetcher, _clock, cache) = setup();
        let cache = Arc::new(cache);

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await
                })
            })
            .collect();
        for task in tasks {
            let keys = task.await.unwrap().unwrap();
            assert_eq!(keys.keys.len(), 1);
        }

        assert_eq!(
            cache.stats(),
            CacheStats {
                discovery_entries: 1,
                key_set_entries: 1,
            }
        );
        assert!(fetcher.calls_to(JWKS_URI) >= 1);
    }

    #[tokio::test]
    async fn test_key_set_age_tracks_last_fetch() {
        let (_fetcher, clock, cache) = setup();
        assert_eq!(cache.key_set_age(Some(DISCOVERY_URI)), None);

        cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        clock.advance(Duration::from_secs(45));
        assert_eq!(cache.key_set_age(Some(DISCOVERY_URI)), Some(Duration::from_secs(45)));

        cache.get_discovery_keys(Some(DISCOVERY_URI), None, true).await.unwrap();
        assert_eq!(cache.key_set_age(Some(DISCOVERY_URI)), Some(Duration::ZERO));

        clock.advance(TTL * 2);
        assert_eq!(cache.key_set_age(Some(DISCOVERY_URI)), Some(TTL * 2));
    }

    #[tokio::test]
    async fn test_force_refresh_keys_keeps_fresh_document() {
        let (fetcher, _clock, cache) = setup();

        cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        cache.get_discovery_keys(Some(DISCOVERY_URI), None, true).await.unwrap();

        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 1);
        assert_eq!(fetcher.calls_to(JWKS_URI), 2);
    }

    #[tokio::test]
    async fn test_document_without_jwks_uri() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.route_json(DISCOVERY_URI, 200, &json!({ "issuer": "https://idp.example" }));
        let cache = cache_with(&fetcher, &ManualClock::default());

        let err = cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::MissingJwksUri { ref uri } if uri == DISCOVERY_URI));
    }

    #[tokio::test]
    async fn test_keys_error_names_jwks_endpoint() {
        let (fetcher, _clock, cache) = setup();
        fetcher.route_raw(JWKS_URI, 404, "");

        let err = cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap_err();
        match err {
            DiscoveryError::KeysFetch { status, uri } => {
                assert_eq!(status, 404);
                assert_eq!(uri, JWKS_URI);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cache.stats().key_set_entries, 0);

        fetcher.route_raw(JWKS_URI, 200, "[1, 2]");
        let err = cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::KeysDecode { .. }));
    }

    #[tokio::test]
    async fn test_sweep_respects_grace_window() {
        let (fetcher, clock, cache) = setup();
        let recent = "https://recent.example/.well-known/openid-configuration";
        fetcher.route_json(recent, 200, &json!({ "issuer": "https://recent.example" }));

        cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        clock.advance(Duration::from_secs(1800));
        cache.get_discovery(Some(recent), None, false).await.unwrap();

        // Now 5401s after start with a 600s grace: idp.example expired at 3600s and
        // falls before the 4801s threshold, recent.example expires at 5400s.
        clock.advance(Duration::from_secs(3600 + 1));
        let stats = cache.sweep().unwrap();

        assert_eq!(
            stats,
            SweepStats {
                discovery_evicted: 1,
                key_sets_evicted: 1,
            }
        );
        assert!(cache.documents.get(DISCOVERY_URI).is_none());
        assert!(cache.key_sets.get(DISCOVERY_URI).is_none());
        assert!(cache.documents.get(recent).is_some());
    }

    #[tokio::test]
    async fn test_sweep_keeps_recently_expired_entries() {
        let (_fetcher, clock, cache) = setup();

        cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        clock.advance(TTL + Duration::from_secs(599));

        assert_eq!(cache.sweep().unwrap(), SweepStats::default());
        assert_eq!(cache.stats().discovery_entries, 1);
        assert_eq!(cache.stats().key_set_entries, 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let (fetcher, _clock, cache) = setup();

        cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        cache.invalidate(DISCOVERY_URI);
        assert_eq!(cache.stats(), CacheStats::default());

        cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        assert_eq!(fetcher.calls_to(DISCOVERY_URI), 2);
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_eviction_loop_stops_on_cancel() {
        let (_fetcher, _clock, cache) = setup();
        let cache = Arc::new(cache);
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let cache = Arc::clone(&cache);
            let cancel = cancel.clone();
            async move { cache.run_eviction_loop(cancel).await }
        });
        tokio::task::yield_now().await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("loop did not stop")
            .unwrap();
        assert!(matches!(result, Err(DiscoveryError::Cancelled)));
    }

    #[tokio::test]
    async fn test_eviction_loop_with_cancelled_token_never_sweeps() {
        let (_fetcher, clock, cache) = setup();
        cache.get_discovery(Some(DISCOVERY_URI), None, false).await.unwrap();
        clock.advance(Duration::from_secs(86400));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = cache.run_eviction_loop(cancel).await;

        assert!(matches!(result, Err(DiscoveryError::Cancelled)));
        assert_eq!(cache.stats().discovery_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_loop_sweeps_each_interval() {
        let (_fetcher, clock, cache) = setup();
        let cache = Arc::new(cache);
        cache.get_discovery_keys(Some(DISCOVERY_URI), None, false).await.unwrap();
        clock.advance(TTL + Duration::from_secs(601));

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cache = Arc::clone(&cache);
            let cancel = cancel.clone();
            async move { cache.run_eviction_loop(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.stats(), CacheStats::default());

        cancel.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(DiscoveryError::Cancelled)));
    }
}

//! Time-bounded cache of the remote catalog.
//!
//! The catalog listing is persisted through a [`CatalogCacheRepository`] and
//! served from there while it is younger than the TTL. A forced read always
//! goes to the network. When a refresh fails the previous snapshot is served
//! unchanged; only a failure with nothing cached surfaces as an error.
//!
//! Misses are serialized behind a refresh lock. A non-forced caller that
//! waited on the lock re-checks freshness first, so a burst of concurrent
//! misses performs a single fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use kitsync_core::defaults;
use kitsync_core::{
    CatalogCacheEntry, CatalogCacheRepository, Clock, Error, Result, TemplateDetail,
};

use crate::client::CatalogSource;

/// Cache tuning.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    /// Timeout for background refreshes.
    pub timeout: Duration,
    /// Timeout for user-initiated forced refreshes.
    pub force_timeout: Duration,
    /// Timeout for single template payloads.
    pub template_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(defaults::CATALOG_TTL_SECS),
            timeout: Duration::from_secs(defaults::CATALOG_TIMEOUT_SECS),
            force_timeout: Duration::from_secs(defaults::CATALOG_FORCE_TIMEOUT_SECS),
            template_timeout: Duration::from_secs(defaults::TEMPLATE_TIMEOUT_SECS),
        }
    }
}

impl CacheConfig {
    /// Read `CATALOG_TTL_SECS`; timeouts keep their defaults.
    pub fn from_env() -> Self {
        let ttl = std::env::var("CATALOG_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::CATALOG_TTL_SECS);
        Self {
            ttl: Duration::from_secs(ttl),
            ..Self::default()
        }
    }
}

/// Read-through cache over a [`CatalogSource`].
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn CatalogCacheRepository>,
    source: Arc<dyn CatalogSource>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    refresh: Mutex<()>,
}

impl CatalogCache {
    pub fn new(
        store: Arc<dyn CatalogCacheRepository>,
        source: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                source,
                clock,
                config,
                refresh: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn is_fresh(&self, entry: &CatalogCacheEntry) -> bool {
        let ttl = chrono::Duration::from_std(self.inner.config.ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        self.inner.clock.now() < entry.fetched_at + ttl
    }

    /// Current catalog snapshot, refreshed when stale or when `force` is set.
    pub async fn get(&self, force: bool) -> Result<CatalogCacheEntry> {
        if !force {
            if let Some(entry) = self.inner.store.load_catalog().await? {
                if self.is_fresh(&entry) {
                    debug!(
                        subsystem = "catalog",
                        component = "catalog_cache",
                        op = "get",
                        result_count = entry.count,
                        "Cache HIT"
                    );
                    return Ok(entry);
                }
            }
        }

        let _guard = self.inner.refresh.lock().await;
        let previous = self.inner.store.load_catalog().await?;
        if !force {
            if let Some(entry) = previous.as_ref().filter(|e| self.is_fresh(e)) {
                debug!(
                    subsystem = "catalog",
                    component = "catalog_cache",
                    op = "get",
                    "Cache refreshed by concurrent caller"
                );
                return Ok(entry.clone());
            }
        }

        debug!(
            subsystem = "catalog",
            component = "catalog_cache",
            op = "get",
            force,
            "Cache MISS"
        );
        let timeout = if force {
            self.inner.config.force_timeout
        } else {
            self.inner.config.timeout
        };

        let start = Instant::now();
        match self.inner.source.fetch_catalog(timeout).await {
            Ok(templates) => {
                let entry = CatalogCacheEntry::new(templates, self.inner.clock.now());
                self.inner.store.store_catalog(&entry).await?;
                info!(
                    subsystem = "catalog",
                    component = "catalog_cache",
                    op = "refresh",
                    force,
                    result_count = entry.count,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Catalog refreshed"
                );
                Ok(entry)
            }
            Err(err) => match previous {
                Some(entry) => {
                    warn!(
                        subsystem = "catalog",
                        component = "catalog_cache",
                        op = "refresh",
                        force,
                        fetch_reason = err.reason(),
                        error = %err,
                        "Catalog refresh failed, serving previous snapshot"
                    );
                    Ok(entry)
                }
                None => {
                    warn!(
                        subsystem = "catalog",
                        component = "catalog_cache",
                        op = "refresh",
                        force,
                        fetch_reason = err.reason(),
                        error = %err,
                        "Catalog refresh failed with nothing cached"
                    );
                    Err(Error::Fetch(err))
                }
            },
        }
    }

    /// Payload of a single template. Never cached.
    pub async fn get_one(&self, template_id: i64) -> Result<TemplateDetail> {
        self.inner
            .source
            .fetch_template(template_id, self.inner.config.template_timeout)
            .await
            .map_err(|err| {
                warn!(
                    subsystem = "catalog",
                    component = "catalog_cache",
                    op = "get_one",
                    template_id,
                    fetch_reason = err.reason(),
                    error = %err,
                    "Template fetch failed"
                );
                Error::Fetch(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use kitsync_core::{FetchError, ManualClock, TemplateSummary};
    use kitsync_db::MemoryStore;

    use crate::client::CatalogSource;

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        fail: AtomicBool,
        timeouts: Mutex<Vec<Duration>>,
    }

    impl FakeSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn timeouts(&self) -> Vec<Duration> {
            self.timeouts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        async fn fetch_catalog(
            &self,
            timeout: Duration,
        ) -> std::result::Result<Vec<TemplateSummary>, FetchError> {
            self.timeouts.lock().unwrap().push(timeout);
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::Timeout(timeout));
            }
            Ok(vec![TemplateSummary {
                id: n as i64,
                title: format!("Fetch {}", n),
                ..Default::default()
            }])
        }

        async fn fetch_template(
            &self,
            _template_id: i64,
            timeout: Duration,
        ) -> std::result::Result<TemplateDetail, FetchError> {
            self.timeouts.lock().unwrap().push(timeout);
            Err(FetchError::HttpStatus(404))
        }
    }

    fn setup() -> (CatalogCache, Arc<FakeSource>, Arc<ManualClock>) {
        let source = Arc::new(FakeSource::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = CatalogCache::new(
            Arc::new(MemoryStore::new()),
            source.clone(),
            clock.clone(),
            CacheConfig {
                ttl: Duration::from_secs(3600),
                ..CacheConfig::default()
            },
        );
        (cache, source, clock)
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_fetch() {
        let (cache, source, clock) = setup();
        cache.get(false).await.unwrap();
        clock.advance(chrono::Duration::seconds(3599));
        let entry = cache.get(false).await.unwrap();
        assert_eq!(source.calls(), 1);
        assert_eq!(entry.templates[0].id, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetched() {
        let (cache, source, clock) = setup();
        cache.get(false).await.unwrap();
        clock.advance(chrono::Duration::seconds(3601));
        let entry = cache.get(false).await.unwrap();
        assert_eq!(source.calls(), 2);
        assert_eq!(entry.templates[0].id, 2);
    }

    #[tokio::test]
    async fn test_force_always_fetches() {
        let (cache, source, _clock) = setup();
        cache.get(false).await.unwrap();
        cache.get(true).await.unwrap();
        cache.get(true).await.unwrap();
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_force_returns_previous_entry() {
        let (cache, source, _clock) = setup();
        let first = cache.get(false).await.unwrap();
        source.fail.store(true, Ordering::SeqCst);
        let served = cache.get(true).await.unwrap();
        assert_eq!(served, first);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_without_entry_is_fetch_error() {
        let (cache, source, _clock) = setup();
        source.fail.store(true, Ordering::SeqCst);
        match cache.get(false).await {
            Err(Error::Fetch(FetchError::Timeout(d))) => {
                assert_eq!(d, Duration::from_secs(defaults::CATALOG_TIMEOUT_SECS))
            }
            other => panic!("expected fetch timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_fetch_once() {
        let (cache, source, _clock) = setup();
        let (a, b, c) = tokio::join!(cache.get(false), cache.get(false), cache.get(false));
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_each_fetch_uses_its_own_timeout() {
        let (cache, source, _clock) = setup();
        cache.get(false).await.unwrap();
        cache.get(true).await.unwrap();
        let _ = cache.get_one(9).await;

        assert_eq!(
            source.timeouts(),
            vec![
                Duration::from_secs(8),
                Duration::from_secs(25),
                Duration::from_secs(40),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_force_reports_force_timeout() {
        let (cache, source, _clock) = setup();
        source.fail.store(true, Ordering::SeqCst);
        match cache.get(true).await {
            Err(Error::Fetch(FetchError::Timeout(d))) => {
                assert_eq!(d, Duration::from_secs(defaults::CATALOG_FORCE_TIMEOUT_SECS))
            }
            other => panic!("expected fetch timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_one_maps_fetch_error() {
        let (cache, _source, _clock) = setup();
        assert!(matches!(
            cache.get_one(9).await,
            Err(Error::Fetch(FetchError::HttpStatus(404)))
        ));
    }
}

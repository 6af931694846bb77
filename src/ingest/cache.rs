// src/ingest/cache.rs
//! Per-connector TTL cache with stale-serve-on-error.
//!
//! Entries are replaced wholesale (`Arc<Vec<T>>` swap), so a reader never sees
//! a partially written item list.

use metrics::counter;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::fetcher::FetchError;

#[derive(Debug)]
struct CacheEntry<T> {
    items: Arc<Vec<T>>,
    fetched_at: Instant,
}

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// Fresh entry inside the TTL; no refresh attempted.
    Cached,
    /// Refresh succeeded.
    Refreshed,
    /// Refresh failed; previous entry returned.
    Stale,
    /// Refresh failed and nothing was cached.
    Unavailable,
}

#[derive(Debug)]
pub struct Lookup<T> {
    pub items: Arc<Vec<T>>,
    pub served: Served,
    pub error: Option<FetchError>,
}

impl<T> Lookup<T> {
    /// `Err` only when nothing could be served at all.
    pub fn into_result(self) -> Result<Arc<Vec<T>>, FetchError> {
        match (self.served, self.error) {
            (Served::Unavailable, Some(e)) => Err(e),
            _ => Ok(self.items),
        }
    }
}

pub struct TtlCache<K, T> {
    name: &'static str,
    entries: RwLock<HashMap<K, CacheEntry<T>>>,
}

impl<K, T> TtlCache<K, T>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Items for `key`, degrading to stale or empty on refresh failure.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: K,
        ttl: Duration,
        force: bool,
        refresh: F,
    ) -> Arc<Vec<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, FetchError>>,
    {
        self.lookup_or_refresh(key, ttl, force, refresh).await.items
    }

    /// Like `get_or_refresh`, but reports how the items were obtained.
    pub async fn lookup_or_refresh<F, Fut>(
        &self,
        key: K,
        ttl: Duration,
        force: bool,
        refresh: F,
    ) -> Lookup<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, FetchError>>,
    {
        if !force {
            if let Some(items) = self.fresh(&key, ttl).await {
                counter!("cache_hits_total", "cache" => self.name).increment(1);
                return Lookup {
                    items,
                    served: Served::Cached,
                    error: None,
                };
            }
        }

        match refresh().await {
            Ok(items) => {
                let items = Arc::new(items);
                let mut guard = self.entries.write().await;
                guard.insert(
                    key,
                    CacheEntry {
                        items: items.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                counter!("cache_refresh_total", "cache" => self.name).increment(1);
                Lookup {
                    items,
                    served: Served::Refreshed,
                    error: None,
                }
            }
            Err(e) => {
                let guard = self.entries.read().await;
                match guard.get(&key) {
                    Some(prev) => {
                        counter!("cache_stale_served_total", "cache" => self.name).increment(1);
                        tracing::warn!(target: "cache", cache = self.name, key = ?key, error = %e, "refresh failed, serving stale");
                        Lookup {
                            items: prev.items.clone(),
                            served: Served::Stale,
                            error: Some(e),
                        }
                    }
                    None => {
                        tracing::warn!(target: "cache", cache = self.name, key = ?key, error = %e, "refresh failed, nothing cached");
                        Lookup {
                            items: Arc::new(Vec::new()),
                            served: Served::Unavailable,
                            error: Some(e),
                        }
                    }
                }
            }
        }
    }

    /// Current entry regardless of age.
    pub async fn peek(&self, key: &K) -> Option<Arc<Vec<T>>> {
        self.entries.read().await.get(key).map(|e| e.items.clone())
    }

    /// True when `key` has an entry younger than `ttl`.
    pub async fn is_fresh(&self, key: &K, ttl: Duration) -> bool {
        self.fresh(key, ttl).await.is_some()
    }

    async fn fresh(&self, key: &K, ttl: Duration) -> Option<Arc<Vec<T>>> {
        let guard = self.entries.read().await;
        guard
            .get(key)
            .filter(|e| e.fetched_at.elapsed() < ttl)
            .map(|e| e.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(180);

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_short_circuits_refresh() {
        let cache: TtlCache<&str, u32> = TtlCache::new("t");
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_refresh("k", TTL, false, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2])
                })
                .await;
            assert_eq!(*v, vec![1, 2]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_or_forced_entry_refreshes() {
        let cache: TtlCache<&str, u32> = TtlCache::new("t");
        cache.get_or_refresh("k", TTL, false, || async { Ok(vec![1]) }).await;

        let forced = cache
            .lookup_or_refresh("k", TTL, true, || async { Ok(vec![2]) })
            .await;
        assert_eq!(forced.served, Served::Refreshed);
        assert_eq!(*forced.items, vec![2]);

        tokio::time::advance(TTL).await;
        let expired = cache
            .lookup_or_refresh("k", TTL, false, || async { Ok(vec![3]) })
            .await;
        assert_eq!(expired.served, Served::Refreshed);
        assert_eq!(*expired.items, vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_serves_stale_then_empty() {
        let cache: TtlCache<&str, u32> = TtlCache::new("t");
        cache.get_or_refresh("k", TTL, false, || async { Ok(vec![7]) }).await;

        let stale = cache
            .lookup_or_refresh("k", TTL, true, || async { Err(FetchError::Status(500)) })
            .await;
        assert_eq!(stale.served, Served::Stale);
        assert_eq!(*stale.items, vec![7]);
        assert_eq!(stale.error, Some(FetchError::Status(500)));

        let none = cache
            .lookup_or_refresh("other", TTL, false, || async { Err(FetchError::Disabled) })
            .await;
        assert_eq!(none.served, Served::Unavailable);
        assert!(none.items.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let cache: TtlCache<String, u32> = TtlCache::new("t");
        cache.get_or_refresh("a".into(), TTL, false, || async { Ok(vec![1]) }).await;
        cache.get_or_refresh("b".into(), TTL, false, || async { Ok(vec![2]) }).await;
        assert_eq!(*cache.peek(&"a".to_string()).await.unwrap(), vec![1]);
        assert_eq!(*cache.peek(&"b".to_string()).await.unwrap(), vec![2]);
    }
}

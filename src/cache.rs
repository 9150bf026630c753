//! Query cache for server snapshots
//!
//! Key-addressed store of the last server reply per resource+parameters.
//! Entries are never merged: a fetch replaces the whole entry. After a
//! mutation the affected scopes are invalidated (marked stale) and the next
//! read refetches lazily. A failed refetch leaves the stale value in place.
//!
//! The one in-place edit is [`QueryCache::patch`], used for the optimistic
//! currency-preference update.

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::ClientError;

/// Default freshness window for user-search results
pub const SEARCH_STALE_SECS: u64 = 120;

/// Cache key: one entry per resource and parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    CurrentUser,
    Balance,
    TransactionHistory { page: u32, limit: u32 },
    Cards,
    Friends,
    UserSearch(String),
}

/// Invalidation scope. A scope covers every key of a resource family,
/// e.g. `Transactions` covers all history pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    CurrentUser,
    Balance,
    Transactions,
    Cards,
    Friends,
    Users,
    All,
}

impl QueryKey {
    pub fn scope(&self) -> CacheScope {
        match self {
            QueryKey::CurrentUser => CacheScope::CurrentUser,
            QueryKey::Balance => CacheScope::Balance,
            QueryKey::TransactionHistory { .. } => CacheScope::Transactions,
            QueryKey::Cards => CacheScope::Cards,
            QueryKey::Friends => CacheScope::Friends,
            QueryKey::UserSearch(_) => CacheScope::Users,
        }
    }

    fn matches(&self, scope: CacheScope) -> bool {
        scope == CacheScope::All || self.scope() == scope
    }
}

struct CacheEntry {
    value: serde_json::Value,
    fetched_at: Instant,
    stale: bool,
}

/// Client-side query cache. Cheap to share behind `&`.
pub struct QueryCache {
    entries: DashMap<QueryKey, CacheEntry>,
    search_ttl: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_search_ttl(Duration::from_secs(SEARCH_STALE_SECS))
    }

    pub fn with_search_ttl(search_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            search_ttl,
        }
    }

    /// Time after which an entry goes stale on its own. `None`: only
    /// invalidation makes it stale.
    fn ttl(&self, key: &QueryKey) -> Option<Duration> {
        match key {
            QueryKey::UserSearch(_) => Some(self.search_ttl),
            _ => None,
        }
    }

    /// Missing, invalidated or expired
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        match self.entries.get(key) {
            None => true,
            Some(entry) => {
                entry.stale
                    || self
                        .ttl(key)
                        .is_some_and(|ttl| entry.fetched_at.elapsed() >= ttl)
            }
        }
    }

    /// Read-through: return the cached value if fresh, otherwise run
    /// `fetcher`, store its result and return it.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, ClientError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        if !self.is_stale(&key)
            && let Some(value) = self.get::<T>(&key)
        {
            debug!(key = ?key, "[cache] hit");
            return Ok(value);
        }

        debug!(key = ?key, "[cache] miss, fetching");
        let value = fetcher().await?;
        self.set(key, &value)?;
        Ok(value)
    }

    /// Peek at an entry regardless of staleness
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let entry = self.entries.get(key)?;
        serde_json::from_value(entry.value.clone()).ok()
    }

    /// Replace an entry wholesale with a fresh server value
    pub fn set<T: Serialize>(&self, key: QueryKey, value: &T) -> Result<(), ClientError> {
        let value = serde_json::to_value(value)?;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
                stale: false,
            },
        );
        Ok(())
    }

    /// Edit a cached value in place without touching its freshness.
    /// Returns false when there is no entry to patch.
    pub fn patch<T, F>(&self, key: &QueryKey, f: F) -> bool
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return false;
        };
        let Ok(mut value) = serde_json::from_value::<T>(entry.value.clone()) else {
            return false;
        };
        f(&mut value);
        match serde_json::to_value(&value) {
            Ok(v) => {
                entry.value = v;
                true
            }
            Err(_) => false,
        }
    }

    /// Mark every entry under `scopes` stale. Returns how many were marked.
    pub fn invalidate(&self, scopes: &[CacheScope]) -> usize {
        let mut marked = 0;
        for mut entry in self.entries.iter_mut() {
            if scopes.iter().any(|s| entry.key().matches(*s)) {
                entry.value_mut().stale = true;
                marked += 1;
            }
        }
        debug!(scopes = ?scopes, marked, "[cache] invalidated");
        marked
    }

    /// Drop every entry (logout)
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn fetch_counted(cache: &QueryCache, key: QueryKey, calls: &AtomicUsize, value: u64) -> u64 {
        cache
            .fetch(key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<u64, ClientError>(value)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_from_cache() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);

        assert_eq!(fetch_counted(&cache, QueryKey::Balance, &calls, 10).await, 10);
        assert_eq!(fetch_counted(&cache, QueryKey::Balance, &calls, 99).await, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);

        fetch_counted(&cache, QueryKey::Balance, &calls, 10).await;
        assert_eq!(cache.invalidate(&[CacheScope::Balance]), 1);
        assert!(cache.is_stale(&QueryKey::Balance));

        assert_eq!(fetch_counted(&cache, QueryKey::Balance, &calls, 42).await, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_scope_covers_all_history_pages() {
        let cache = QueryCache::new();
        cache.set(QueryKey::TransactionHistory { page: 1, limit: 10 }, &1u32).unwrap();
        cache.set(QueryKey::TransactionHistory { page: 2, limit: 10 }, &2u32).unwrap();
        cache.set(QueryKey::Friends, &3u32).unwrap();

        assert_eq!(cache.invalidate(&[CacheScope::Transactions]), 2);
        assert!(cache.is_stale(&QueryKey::TransactionHistory { page: 2, limit: 10 }));
        assert!(!cache.is_stale(&QueryKey::Friends));
    }

    #[tokio::test]
    async fn test_failed_refetch_keeps_stale_value() {
        let cache = QueryCache::new();
        cache.set(QueryKey::Cards, &vec![1u64, 2]).unwrap();
        cache.invalidate(&[CacheScope::All]);

        let res: Result<Vec<u64>, _> = cache
            .fetch(QueryKey::Cards, || async {
                Err(ClientError::Network("down".into()))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(cache.get::<Vec<u64>>(&QueryKey::Cards), Some(vec![1, 2]));
        assert!(cache.is_stale(&QueryKey::Cards));
    }

    #[tokio::test]
    async fn test_search_results_expire() {
        let cache = QueryCache::with_search_ttl(Duration::ZERO);
        let key = QueryKey::UserSearch("bob".into());
        cache.set(key.clone(), &vec!["bob".to_string()]).unwrap();
        assert!(cache.is_stale(&key));

        let cache = QueryCache::new();
        cache.set(key.clone(), &vec!["bob".to_string()]).unwrap();
        assert!(!cache.is_stale(&key));
    }

    #[test]
    fn test_patch_in_place() {
        let cache = QueryCache::new();
        assert!(!cache.patch::<u64, _>(&QueryKey::Balance, |b| *b += 1));

        cache.set(QueryKey::Balance, &10u64).unwrap();
        assert!(cache.patch::<u64, _>(&QueryKey::Balance, |b| *b += 1));
        assert_eq!(cache.get::<u64>(&QueryKey::Balance), Some(11));
        assert!(!cache.is_stale(&QueryKey::Balance));
    }

    #[test]
    fn test_clear() {
        let cache = QueryCache::new();
        cache.set(QueryKey::Balance, &10u64).unwrap();
        cache.set(QueryKey::Friends, &Vec::<u64>::new()).unwrap();
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}

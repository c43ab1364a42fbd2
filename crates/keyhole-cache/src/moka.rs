use async_trait::async_trait;
use keyhole_core::ShortCode;
use moka::future::Cache;
use moka::ops::compute::Op;
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

use crate::{new_lease_token, LeaseLock, LeaseToken, Result, UrlCache};

const DEFAULT_MAX_CAPACITY: u64 = 10_000;

/// A value that carries its own time-to-live.
#[derive(Debug, Clone)]
struct Expiring<V> {
    value: V,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with; overwrites restart
/// the clock.
struct PerEntryTtl;

impl<V> Expiry<String, Expiring<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Expiring<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Expiring<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// An in-memory implementation of [`UrlCache`] and [`LeaseLock`] using Moka.
///
/// Entries and leases live in two separate caches, so a lease can never be
/// read back as a URL. Lease acquisition goes through Moka's entry API,
/// which inserts atomically per key, and a lease is only removed by the
/// token it was taken with. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct MokaUrlCache {
    entries: Cache<String, Expiring<String>>,
    leases: Cache<String, Expiring<LeaseToken>>,
}

impl MokaUrlCache {
    /// Creates a new Moka URL cache with default settings.
    ///
    /// The cache will have a default maximum capacity of 10,000 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// Creates a new Moka URL cache with a custom maximum capacity.
    ///
    /// # Arguments
    ///
    /// * `max_capacity` - Maximum number of URL entries the cache can hold
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
            leases: Cache::builder().expire_after(PerEntryTtl).build(),
        }
    }

    /// Returns a builder for creating a custom cache configuration.
    pub fn builder() -> MokaCacheConfigBuilder {
        MokaCacheConfig::builder()
    }
}

impl Default for MokaUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlCache for MokaUrlCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>> {
        trace!(code = %code, "Fetching long URL from Moka cache");

        match self.entries.get(code.as_str()).await {
            Some(entry) => {
                debug!(code = %code, "Cache hit in Moka");
                Ok(Some(entry.value))
            }
            None => {
                trace!(code = %code, "Cache miss in Moka");
                Ok(None)
            }
        }
    }

    async fn set_url(&self, code: &ShortCode, long_url: &str, ttl: Duration) -> Result<()> {
        trace!(code = %code, "Storing long URL in Moka cache");

        let entry = Expiring {
            value: long_url.to_owned(),
            ttl,
        };
        self.entries.insert(code.as_str().to_owned(), entry).await;
        debug!(code = %code, "Cached long URL in Moka");
        Ok(())
    }
}

#[async_trait]
impl LeaseLock for MokaUrlCache {
    async fn try_lock(&self, code: &ShortCode, lease: Duration) -> Result<Option<LeaseToken>> {
        let token = new_lease_token();
        let entry = self
            .leases
            .entry(code.as_str().to_owned())
            .or_insert(Expiring {
                value: token.clone(),
                ttl: lease,
            })
            .await;

        let acquired = entry.is_fresh();
        trace!(code = %code, acquired, "Lease acquisition attempted");
        Ok(acquired.then_some(token))
    }

    async fn unlock(&self, code: &ShortCode, token: &LeaseToken) -> Result<()> {
        let outcome = self
            .leases
            .entry(code.as_str().to_owned())
            .and_compute_with(|held| {
                let op = match held {
                    Some(entry) if entry.value().value == *token => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        trace!(code = %code, outcome = ?outcome, "Released lease in Moka");
        Ok(())
    }
}

/// Configuration for creating a MokaUrlCache with custom settings.
#[derive(Debug, TypedBuilder, Default)]
pub struct MokaCacheConfig {
    /// Maximum number of URL entries the cache can hold.
    #[builder(default, setter(strip_option))]
    max_capacity: Option<u64>,
}

impl From<MokaCacheConfig> for MokaUrlCache {
    fn from(config: MokaCacheConfig) -> Self {
        MokaUrlCache::with_capacity(config.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(3600);

    fn code(s: &str) -> ShortCode {
        ShortCode::new(s).unwrap()
    }

    #[tokio::test]
    async fn cache_get_and_set() {
        let cache = MokaUrlCache::new();
        let c = code("abc123");

        assert!(cache.get_url(&c).await.unwrap().is_none());

        cache.set_url(&c, "https://example.com", HOUR).await.unwrap();

        let result = cache.get_url(&c).await.unwrap();
        assert_eq!(result.as_deref(), Some("https://example.com"));
    }

    #[tokio::test]
    async fn cache_entry_expires_after_its_ttl() {
        let cache = MokaUrlCache::new();
        let short = code("short");
        let long = code("long");

        cache
            .set_url(&short, "https://short.example", Duration::from_millis(50))
            .await
            .unwrap();
        cache.set_url(&long, "https://long.example", HOUR).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get_url(&short).await.unwrap().is_none());
        assert!(cache.get_url(&long).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cache_builder_pattern() {
        let cache: MokaUrlCache = MokaUrlCache::builder().max_capacity(1000).build().into();

        let c = code("abc123");
        cache.set_url(&c, "https://example.com", HOUR).await.unwrap();
        assert!(cache.get_url(&c).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_unlocked() {
        let cache = MokaUrlCache::new();
        let c = code("g9");

        let token = cache.try_lock(&c, HOUR).await.unwrap().unwrap();
        assert!(cache.try_lock(&c, HOUR).await.unwrap().is_none());

        cache.unlock(&c, &token).await.unwrap();
        assert!(cache.try_lock(&c, HOUR).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lock_lease_expires_without_unlock() {
        let cache = MokaUrlCache::new();
        let c = code("g9");

        assert!(cache
            .try_lock(&c, Duration::from_millis(50))
            .await
            .unwrap()
            .is_some());
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.try_lock(&c, HOUR).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_holder_cannot_release_successor() {
        let cache = MokaUrlCache::new();
        let c = code("g9");

        let stale = cache
            .try_lock(&c, Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let current = cache.try_lock(&c, HOUR).await.unwrap().unwrap();
        assert_ne!(stale, current);

        cache.unlock(&c, &stale).await.unwrap();
        assert!(cache.try_lock(&c, HOUR).await.unwrap().is_none());

        cache.unlock(&c, &current).await.unwrap();
        assert!(cache.try_lock(&c, HOUR).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unlock_without_lock_is_fine() {
        let cache = MokaUrlCache::new();
        cache
            .unlock(&code("nobody"), &LeaseToken::new("stray"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn held_lock_is_not_a_cache_hit() {
        let cache = MokaUrlCache::new();
        let c = code("g9");

        assert!(cache.try_lock(&c, HOUR).await.unwrap().is_some());
        assert!(cache.get_url(&c).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_lock_attempts_elect_one_owner() {
        let cache = MokaUrlCache::new();
        let winners = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..20 {
            let cache = cache.clone();
            let winners = Arc::clone(&winners);
            handles.push(tokio::spawn(async move {
                if cache.try_lock(&code("hot"), HOUR).await.unwrap().is_some() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}

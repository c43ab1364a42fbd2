use crate::error::CacheError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::time::Duration;

/// Type alias for cache results.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A cache of resolved long URLs keyed by [`ShortCode`].
///
/// Entries are never invalidated explicitly: a code maps to the same URL
/// for its whole lifetime, so entries only leave the cache through TTL
/// expiry or eviction.
#[async_trait]
pub trait UrlCache: Send + Sync + 'static {
    /// Get the long URL from cache.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Store the long URL in cache for `ttl`.
    async fn set_url(&self, code: &ShortCode, long_url: &str, ttl: Duration) -> Result<()>;
}

/// Proof of one lease acquisition.
///
/// Only the holder of the token a lease was taken with can release it, so a
/// holder whose lease expired cannot release its successor's lease.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaseToken(String);

impl LeaseToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A per-code mutual-exclusion lease used to elect a single recomputation
/// owner on cache miss.
///
/// Lock keys live in a namespace distinct from cache keys, so a held lock is
/// never mistaken for a cached value.
#[async_trait]
pub trait LeaseLock: Send + Sync + 'static {
    /// Atomically takes the lease if nobody holds it, returning the token
    /// that releases it.
    ///
    /// The lease expires on its own after `lease`, even if never released.
    async fn try_lock(&self, code: &ShortCode, lease: Duration) -> Result<Option<LeaseToken>>;

    /// Releases the lease if it is still held under `token`.
    ///
    /// It is not an error if the lease already expired or was taken over.
    async fn unlock(&self, code: &ShortCode, token: &LeaseToken) -> Result<()>;
}

use async_trait::async_trait;
use keyhole_core::{CacheError, ShortCode};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::keys::KeySpace;
use crate::{new_lease_token, LeaseLock, LeaseToken, Result, UrlCache};

/// Deletes the lease only while it still holds the caller's token.
const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// A Redis-based implementation of [`UrlCache`] and [`LeaseLock`].
///
/// Entries are plain strings written with `SET .. PX`; leases are taken with
/// `SET .. NX PX` so that acquisition and expiry are a single atomic command.
/// The lease value is a per-acquisition token, and release is a server-side
/// compare-and-delete on that token.
#[derive(Clone)]
pub struct RedisUrlCache {
    conn: ConnectionManager,
    keys: KeySpace,
    release: redis::Script,
}

impl std::fmt::Debug for RedisUrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisUrlCache")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("timed out") {
        CacheError::Timeout(message)
    } else if err.is_io_error() || lowered.contains("refused") {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

/// `PX` takes a positive millisecond count.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis())
        .unwrap_or(u64::MAX)
        .max(1)
}

impl RedisUrlCache {
    /// Creates a new Redis URL cache.
    ///
    /// # Arguments
    ///
    /// * `conn` - A reconnecting Redis connection manager
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_keys(conn, KeySpace::default())
    }

    /// Creates a new Redis URL cache with a custom key layout.
    pub fn with_keys(conn: ConnectionManager, keys: KeySpace) -> Self {
        Self {
            conn,
            keys,
            release: redis::Script::new(RELEASE_LEASE_SCRIPT),
        }
    }

    /// Opens a client for `redis_url` and connects a connection manager.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error("invalid Redis URL", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl UrlCache for RedisUrlCache {
    async fn get_url(&self, code: &ShortCode) -> Result<Option<String>> {
        let key = self.keys.url_key(code);
        trace!(code = %code, "Fetching long URL from Redis cache");

        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(long_url)) => {
                debug!(code = %code, "Cache hit in Redis");
                Ok(Some(long_url))
            }
            Ok(None) => {
                trace!(code = %code, "Cache miss in Redis");
                Ok(None)
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Redis error on get");
                Err(map_redis_error("failed to fetch value from Redis", e))
            }
        }
    }

    async fn set_url(&self, code: &ShortCode, long_url: &str, ttl: Duration) -> Result<()> {
        let key = self.keys.url_key(code);
        trace!(code = %code, "Storing long URL in Redis cache");

        let mut conn = self.conn.clone();
        let written = redis::cmd("SET")
            .arg(&key)
            .arg(long_url)
            .arg("PX")
            .arg(millis(ttl))
            .query_async::<()>(&mut conn)
            .await;

        match written {
            Ok(()) => {
                debug!(code = %code, ttl_ms = millis(ttl), "Cached long URL in Redis");
                Ok(())
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to cache long URL in Redis");
                Err(map_redis_error("failed to write value to Redis", e))
            }
        }
    }
}

#[async_trait]
impl LeaseLock for RedisUrlCache {
    async fn try_lock(&self, code: &ShortCode, lease: Duration) -> Result<Option<LeaseToken>> {
        let key = self.keys.lock_key(code);
        let token = new_lease_token();

        let mut conn = self.conn.clone();
        let reply = redis::cmd("SET")
            .arg(&key)
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(millis(lease))
            .query_async::<Option<String>>(&mut conn)
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "Redis error on lock acquisition");
                map_redis_error("failed to acquire lease in Redis", e)
            })?;

        let acquired = reply.is_some();
        trace!(code = %code, acquired, "Lease acquisition attempted");
        Ok(acquired.then_some(token))
    }

    async fn unlock(&self, code: &ShortCode, token: &LeaseToken) -> Result<()> {
        let key = self.keys.lock_key(code);

        let mut conn = self.conn.clone();
        match self
            .release
            .key(&key)
            .arg(token.as_str())
            .invoke_async::<i64>(&mut conn)
            .await
        {
            Ok(1) => {
                trace!(code = %code, "Released lease in Redis");
                Ok(())
            }
            Ok(_) => {
                debug!(code = %code, "Lease already expired or taken over, nothing to release");
                Ok(())
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to release lease in Redis");
                Err(map_redis_error("failed to release lease in Redis", e))
            }
        }
    }
}

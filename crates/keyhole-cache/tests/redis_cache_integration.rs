use std::time::Duration;

use keyhole_cache::{KeySpace, LeaseLock, LeaseToken, RedisUrlCache, UrlCache};
use keyhole_core::ShortCode;
use keyhole_test_infra::redis::RedisServer;

/// Test fixture that manages a Redis container using test-infra.
pub struct RedisTestContainer {
    #[allow(dead_code)]
    redis: RedisServer,
    redis_url: String,
}

impl RedisTestContainer {
    /// Starts a new Redis container with a random available port.
    pub async fn start() -> Self {
        let redis = RedisServer::new()
            .await
            .expect("Failed to start Redis server");
        let redis_url = redis.redis_url().await.expect("Failed to get Redis URL");

        Self { redis, redis_url }
    }

    pub async fn cache(&self) -> RedisUrlCache {
        RedisUrlCache::connect(&self.redis_url)
            .await
            .expect("Failed to connect to Redis")
    }

    /// A raw connection for inspecting keys behind the cache's back.
    pub async fn raw_connection(&self) -> redis::aio::MultiplexedConnection {
        let client =
            redis::Client::open(self.redis_url.as_str()).expect("Failed to create Redis client");
        client
            .get_multiplexed_async_connection()
            .await
            .expect("Failed to get Redis connection")
    }
}

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_redis_cache_basic_get_set() {
    let fixture = RedisTestContainer::start().await;
    let cache = fixture.cache().await;

    let code = ShortCode::new("g9").unwrap();

    let result = cache.get_url(&code).await.unwrap();
    assert!(result.is_none(), "Cache should be empty initially");

    cache
        .set_url(&code, "https://example.com", HOUR)
        .await
        .unwrap();

    let result = cache.get_url(&code).await.unwrap();
    assert_eq!(result.as_deref(), Some("https://example.com"));
}

#[tokio::test]
async fn test_redis_cache_entry_carries_ttl() {
    let fixture = RedisTestContainer::start().await;
    let cache = fixture.cache().await;
    let mut raw = fixture.raw_connection().await;

    let code = ShortCode::new("ttl1").unwrap();
    cache
        .set_url(&code, "https://example.com/ttl", HOUR)
        .await
        .unwrap();

    let key = KeySpace::default().url_key(&code);
    let pttl: i64 = redis::cmd("PTTL")
        .arg(&key)
        .query_async(&mut raw)
        .await
        .unwrap();

    assert!(pttl > 0 && pttl <= 3_600_000, "unexpected PTTL {pttl}");
}

#[tokio::test]
async fn test_redis_cache_entry_expires() {
    let fixture = RedisTestContainer::start().await;
    let cache = fixture.cache().await;

    let code = ShortCode::new("brief").unwrap();
    cache
        .set_url(&code, "https://example.com/brief", Duration::from_millis(200))
        .await
        .unwrap();

    awaitility::at_most(Duration::from_secs(5))
        .poll_interval(Duration::from_millis(100))
        .until_async(|| async { cache.get_url(&code).await.unwrap().is_none() })
        .await;
}

#[tokio::test]
async fn test_redis_lock_is_exclusive() {
    let fixture = RedisTestContainer::start().await;
    let first = fixture.cache().await;
    let second = fixture.cache().await;

    let code = ShortCode::new("hot").unwrap();

    let token = first.try_lock(&code, HOUR).await.unwrap().unwrap();
    assert!(
        second.try_lock(&code, HOUR).await.unwrap().is_none(),
        "A second connection must not acquire a held lease"
    );

    first.unlock(&code, &token).await.unwrap();
    assert!(second.try_lock(&code, HOUR).await.unwrap().is_some());
}

#[tokio::test]
async fn test_redis_expired_holder_cannot_release_successor() {
    let fixture = RedisTestContainer::start().await;
    let first = fixture.cache().await;
    let second = fixture.cache().await;

    let code = ShortCode::new("handoff").unwrap();
    let stale = first
        .try_lock(&code, Duration::from_millis(200))
        .await
        .unwrap()
        .unwrap();

    let lock_key = KeySpace::default().lock_key(&code);
    let raw = fixture.raw_connection().await;

    awaitility::at_most(Duration::from_secs(5))
        .poll_interval(Duration::from_millis(100))
        .until_async(|| async {
            let mut raw = raw.clone();
            let exists: bool = redis::cmd("EXISTS")
                .arg(&lock_key)
                .query_async(&mut raw)
                .await
                .unwrap();
            !exists
        })
        .await;

    let current = second.try_lock(&code, HOUR).await.unwrap().unwrap();
    assert_ne!(stale, current);

    first.unlock(&code, &stale).await.unwrap();
    assert!(
        first.try_lock(&code, HOUR).await.unwrap().is_none(),
        "A stale token must not release the current lease"
    );

    let mut raw = raw.clone();
    let held: Option<String> = redis::cmd("GET")
        .arg(&lock_key)
        .query_async(&mut raw)
        .await
        .unwrap();
    assert_eq!(held.as_deref(), Some(current.as_str()));

    second.unlock(&code, &current).await.unwrap();
    assert!(first.try_lock(&code, HOUR).await.unwrap().is_some());
}

#[tokio::test]
async fn test_redis_lock_lease_expires() {
    let fixture = RedisTestContainer::start().await;
    let cache = fixture.cache().await;

    let code = ShortCode::new("lease").unwrap();
    assert!(cache
        .try_lock(&code, Duration::from_millis(200))
        .await
        .unwrap()
        .is_some());

    awaitility::at_most(Duration::from_secs(5))
        .poll_interval(Duration::from_millis(100))
        .until_async(|| async { cache.try_lock(&code, HOUR).await.unwrap().is_some() })
        .await;
}

#[tokio::test]
async fn test_redis_lock_is_not_a_cache_entry() {
    let fixture = RedisTestContainer::start().await;
    let cache = fixture.cache().await;

    let code = ShortCode::new("split").unwrap();
    assert!(cache.try_lock(&code, HOUR).await.unwrap().is_some());

    assert!(cache.get_url(&code).await.unwrap().is_none());
}

#[tokio::test]
async fn test_redis_unlock_without_lock() {
    let fixture = RedisTestContainer::start().await;
    let cache = fixture.cache().await;

    cache
        .unlock(&ShortCode::new("nobody").unwrap(), &LeaseToken::new("stray"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_redis_cache_unreachable_server_is_an_error() {
    let result = RedisUrlCache::connect("redis://127.0.0.1:1").await;
    assert!(result.is_err());
}

use keyhole_core::IdOffset;
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_ID_OFFSET: u64 = 1000;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_LOCK_LEASE: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Tuning knobs of the [`ResolutionService`](crate::ResolutionService).
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct ResolverSettings {
    /// Added to every store id before encoding.
    #[builder(default = IdOffset::new(DEFAULT_ID_OFFSET), setter(into))]
    id_offset: IdOffset,
    /// Lifetime of a populated cache entry.
    #[builder(default = DEFAULT_CACHE_TTL)]
    cache_ttl: Duration,
    /// How long a recomputation lock survives if its holder never releases it.
    #[builder(default = DEFAULT_LOCK_LEASE)]
    lock_lease: Duration,
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    poll_interval: Duration,
    /// How long a follower waits for the lock holder before reading the store.
    #[builder(default = DEFAULT_POLL_TIMEOUT)]
    poll_timeout: Duration,
}

impl ResolverSettings {
    pub fn id_offset(&self) -> IdOffset {
        self.id_offset
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn lock_lease(&self) -> Duration {
        self.lock_lease
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn poll_timeout(&self) -> Duration {
        self.poll_timeout
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

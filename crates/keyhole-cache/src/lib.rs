//! Cache and lease-lock backends for the Keyhole resolver.
//!
//! Both backends implement [`UrlCache`] and [`LeaseLock`]:
//!
//! - [`RedisUrlCache`] shares entries and leases between every resolver
//!   process connected to the same Redis.
//! - [`MokaUrlCache`] keeps both in process memory, for single-node
//!   deployments and tests.

pub mod keys;
pub mod moka;
pub mod redis;

pub use keys::KeySpace;
pub use keyhole_core::cache::{LeaseLock, LeaseToken, Result, UrlCache};
pub use keyhole_core::CacheError;
pub use self::moka::{MokaCacheConfig, MokaUrlCache};
pub use self::redis::RedisUrlCache;

/// A fresh token for one lease acquisition.
pub(crate) fn new_lease_token() -> LeaseToken {
    LeaseToken::new(uuid::Uuid::new_v4().to_string())
}

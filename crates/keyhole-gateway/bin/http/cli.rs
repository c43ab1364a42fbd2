use clap::{Parser, ValueEnum};
use keyhole_resolver::ResolverSettings;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::time::Duration;

pub const LISTEN_ADDR_ENV: &str = "KEYHOLE_LISTEN_ADDR";
pub const BASE_URL_ENV: &str = "KEYHOLE_BASE_URL";
pub const STORAGE_BACKEND_ENV: &str = "KEYHOLE_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "KEYHOLE_MYSQL_DSN";
pub const CACHE_BACKEND_ENV: &str = "KEYHOLE_CACHE_BACKEND";
pub const REDIS_URL_ENV: &str = "KEYHOLE_REDIS_URL";
pub const ID_OFFSET_ENV: &str = "KEYHOLE_ID_OFFSET";
pub const CACHE_TTL_SECS_ENV: &str = "KEYHOLE_CACHE_TTL_SECS";
pub const LOCK_LEASE_MS_ENV: &str = "KEYHOLE_LOCK_LEASE_MS";
pub const POLL_INTERVAL_MS_ENV: &str = "KEYHOLE_POLL_INTERVAL_MS";
pub const POLL_TIMEOUT_MS_ENV: &str = "KEYHOLE_POLL_TIMEOUT_MS";

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "redis")]
    Redis,
}

impl Display for CacheBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendArg::InMemory => write!(f, "in-memory"),
            CacheBackendArg::Redis => write!(f, "redis"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "keyhole-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    /// Prefix of every returned short URL.
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    #[arg(
        long,
        env = CACHE_BACKEND_ENV,
        value_enum,
        default_value_t = CacheBackendArg::InMemory
    )]
    pub cache: CacheBackendArg,

    #[arg(long, env = REDIS_URL_ENV, required_if_eq("cache", "redis"))]
    pub redis_url: Option<String>,

    #[arg(long, env = ID_OFFSET_ENV, default_value_t = 1000)]
    pub id_offset: u64,

    #[arg(long, env = CACHE_TTL_SECS_ENV, default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = LOCK_LEASE_MS_ENV, default_value_t = 10_000)]
    pub lock_lease_ms: u64,

    #[arg(long, env = POLL_INTERVAL_MS_ENV, default_value_t = 50)]
    pub poll_interval_ms: u64,

    #[arg(long, env = POLL_TIMEOUT_MS_ENV, default_value_t = 2000)]
    pub poll_timeout_ms: u64,
}

impl CLI {
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings::builder()
            .id_offset(self.id_offset)
            .cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .lock_lease(Duration::from_millis(self.lock_lease_ms))
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .poll_timeout(Duration::from_millis(self.poll_timeout_ms))
            .build()
    }
}

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use keyhole_cache::{MokaUrlCache, RedisUrlCache};
use keyhole_core::UrlRepository;
use keyhole_gateway::{metrics, App, AppState};
use keyhole_resolver::ResolutionService;
use keyhole_storage::{InMemoryUrlRepository, MySqlUrlRepository};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use crate::cli::{CacheBackendArg, StorageBackendArg, CLI};

const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let config = CLI::try_parse()?;

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        storage_backend = %config.storage,
        cache_backend = %config.cache,
        id_offset = config.id_offset,
        "starting gateway server"
    );

    let state = match config.storage {
        StorageBackendArg::InMemory => with_storage(&config, InMemoryUrlRepository::new()).await?,
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlUrlRepository::connect(mysql_dsn).await?;
            repository.migrate().await?;
            info!("database migrations applied");
            with_storage(&config, repository).await?
        }
    };

    let metrics_handle = metrics::install_recorder()?;
    let upkeep = metrics_handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });
    let state = state.with_metrics(metrics_handle);
    info!("prometheus recorder installed");

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, App::router(state)).await?;

    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_log::LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keyhole=info,tower_http=info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

async fn with_storage<R: UrlRepository>(config: &CLI, repository: R) -> anyhow::Result<AppState> {
    let settings = config.resolver_settings();

    let state = match config.cache {
        CacheBackendArg::InMemory => {
            let service = ResolutionService::new(repository, MokaUrlCache::new(), settings);
            AppState::new(Arc::new(service), config.base_url.as_str())
        }
        CacheBackendArg::Redis => {
            let redis_url = config
                .redis_url
                .as_deref()
                .context("redis url is required when cache backend is redis")?;
            let cache = RedisUrlCache::connect(redis_url).await?;
            let service = ResolutionService::new(repository, cache, settings);
            AppState::new(Arc::new(service), config.base_url.as_str())
        }
    };

    Ok(state)
}

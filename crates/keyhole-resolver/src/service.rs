use std::sync::Arc;

use crate::guard::LockGuard;
use crate::resolver::Resolver;
use crate::settings::ResolverSettings;
use crate::{ResolveError, Result};
use async_trait::async_trait;
use keyhole_core::{
    BulkShortCode, LeaseLock, OwnerId, ShortCode, UrlCache, UrlRecord, UrlRepository,
};
use tracing::{debug, trace, warn};

/// Cache-aside resolution over a [`UrlRepository`], with a per-code lease
/// that lets a single task recompute a missing cache entry.
///
/// Only the lease holder writes the cache; followers wait for it and, if it
/// takes too long, read the store themselves without writing back.
pub struct ResolutionService<R, C> {
    repository: Arc<R>,
    cache: Arc<C>,
    settings: ResolverSettings,
}

impl<R, C> Clone for ResolutionService<R, C> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cache: Arc::clone(&self.cache),
            settings: self.settings,
        }
    }
}

impl<R: UrlRepository, C: UrlCache + LeaseLock> ResolutionService<R, C> {
    /// Creates a new ResolutionService over `repository`, using `cache` both
    /// for cached URLs and for recomputation leases.
    pub fn new(repository: R, cache: C, settings: ResolverSettings) -> Self {
        Self {
            repository: Arc::new(repository),
            cache: Arc::new(cache),
            settings,
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Reads the record behind `code`.
    ///
    /// A record whose stored code differs from `code` is reported as missing:
    /// this rejects non-canonical spellings such as leading zeros.
    async fn read_store(&self, code: &ShortCode, id: u64) -> Result<String> {
        match self.repository.get_by_id(id).await {
            Ok(record) if record.short_code == *code => Ok(record.long_url),
            Ok(_) => {
                debug!(code = %code, id, "Code is not the canonical code of its id");
                Err(ResolveError::NotFound(code.clone()))
            }
            Err(e) if e.is_not_found() => Err(ResolveError::NotFound(code.clone())),
            Err(e) => Err(ResolveError::Storage(e)),
        }
    }

    /// Lease holder path: read the store and fill the cache.
    async fn recompute(&self, code: &ShortCode, id: u64) -> Result<String> {
        let long_url = self.read_store(code, id).await?;

        match self
            .cache
            .set_url(code, &long_url, self.settings.cache_ttl())
            .await
        {
            Ok(()) => debug!(code = %code, "Populated cache"),
            Err(e) => warn!(code = %code, error = %e, "Failed to populate cache"),
        }

        Ok(long_url)
    }

    /// Follower path: poll the cache until the lease holder fills it.
    ///
    /// Returns `None` once the poll timeout elapses.
    async fn wait_for_holder(&self, code: &ShortCode) -> Option<String> {
        let poll = async {
            loop {
                tokio::time::sleep(self.settings.poll_interval()).await;
                match self.cache.get_url(code).await {
                    Ok(Some(long_url)) => return long_url,
                    Ok(None) => trace!(code = %code, "Still waiting for lock holder"),
                    Err(e) => trace!(code = %code, error = %e, "Cache error while waiting"),
                }
            }
        };

        tokio::time::timeout(self.settings.poll_timeout(), poll)
            .await
            .ok()
    }
}

#[async_trait]
impl<R: UrlRepository, C: UrlCache + LeaseLock> Resolver for ResolutionService<R, C> {
    async fn create_short_code(
        &self,
        long_url: &str,
        owner: Option<OwnerId>,
    ) -> Result<ShortCode> {
        let code = self
            .repository
            .find_or_create_short_code(long_url, self.settings.id_offset(), owner)
            .await?;
        debug!(code = %code, "Short code ready");
        Ok(code)
    }

    async fn create_short_codes(
        &self,
        long_urls: &[String],
        owner: Option<OwnerId>,
    ) -> Result<Vec<BulkShortCode>> {
        let codes = self
            .repository
            .find_or_create_short_codes(long_urls, self.settings.id_offset(), owner)
            .await?;
        debug!(count = codes.len(), "Short codes ready");
        Ok(codes)
    }

    async fn resolve(&self, code: &ShortCode) -> Result<String> {
        trace!(code = %code, "Resolving short code");

        let id = match self.settings.id_offset().to_id(code) {
            Ok(Some(id)) => id,
            Ok(None) | Err(_) => {
                trace!(code = %code, "Code does not map to an id");
                return Err(ResolveError::NotFound(code.clone()));
            }
        };

        match self.cache.get_url(code).await {
            Ok(Some(long_url)) => {
                debug!(code = %code, "Cache hit");
                return Ok(long_url);
            }
            Ok(None) => trace!(code = %code, "Cache miss"),
            Err(e) => warn!(code = %code, error = %e, "Cache read failed"),
        }

        match self.cache.try_lock(code, self.settings.lock_lease()).await {
            Ok(Some(token)) => {
                trace!(code = %code, "Acquired recomputation lock");
                let guard = LockGuard::new(Arc::clone(&self.cache), code.clone(), token);
                let result = self.recompute(code, id).await;
                guard.release().await;
                result
            }
            Ok(None) => {
                if let Some(long_url) = self.wait_for_holder(code).await {
                    debug!(code = %code, "Cache filled by lock holder");
                    return Ok(long_url);
                }
                debug!(code = %code, "Timed out waiting for lock holder, reading store");
                self.read_store(code, id).await
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Lock check failed, reading store");
                self.read_store(code, id).await
            }
        }
    }

    async fn get_history_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRecord>> {
        Ok(self.repository.get_history_by_owner(owner).await?)
    }
}

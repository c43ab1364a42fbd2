use keyhole_core::{LeaseLock, LeaseToken, ShortCode};
use std::sync::Arc;
use tracing::{trace, warn};

/// A held recomputation lease.
///
/// Call [`LockGuard::release`] on the normal path. If the guard is dropped
/// instead (cancellation or panic) the unlock is spawned onto the current
/// runtime; without a runtime the lease is left to expire.
pub(crate) struct LockGuard<L: LeaseLock> {
    lock: Arc<L>,
    code: ShortCode,
    token: LeaseToken,
    released: bool,
}

impl<L: LeaseLock> LockGuard<L> {
    pub(crate) fn new(lock: Arc<L>, code: ShortCode, token: LeaseToken) -> Self {
        Self {
            lock,
            code,
            token,
            released: false,
        }
    }

    pub(crate) async fn release(mut self) {
        self.released = true;
        unlock(self.lock.as_ref(), &self.code, &self.token).await;
    }
}

async fn unlock<L: LeaseLock>(lock: &L, code: &ShortCode, token: &LeaseToken) {
    match lock.unlock(code, token).await {
        Ok(()) => trace!(code = %code, "Released recomputation lock"),
        Err(e) => warn!(code = %code, error = %e, "Failed to release lock, lease will expire"),
    }
}

impl<L: LeaseLock> Drop for LockGuard<L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let lock = Arc::clone(&self.lock);
                let code = self.code.clone();
                let token = self.token.clone();
                handle.spawn(async move { unlock(lock.as_ref(), &code, &token).await });
            }
            Err(_) => {
                warn!(code = %self.code, "No runtime to release lock, lease will expire");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyhole_cache::MokaUrlCache;
    use std::time::Duration;

    const LEASE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn release_frees_the_lease() {
        let cache = Arc::new(MokaUrlCache::new());
        let code = ShortCode::new("g9").unwrap();

        let token = cache.try_lock(&code, LEASE).await.unwrap().unwrap();
        LockGuard::new(Arc::clone(&cache), code.clone(), token)
            .release()
            .await;

        assert!(cache.try_lock(&code, LEASE).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn drop_frees_the_lease_in_the_background() {
        let cache = Arc::new(MokaUrlCache::new());
        let code = ShortCode::new("g9").unwrap();

        let token = cache.try_lock(&code, LEASE).await.unwrap().unwrap();
        drop(LockGuard::new(Arc::clone(&cache), code.clone(), token));

        let mut freed = false;
        for _ in 0..50 {
            tokio::task::yield_now().await;
            if cache.try_lock(&code, LEASE).await.unwrap().is_some() {
                freed = true;
                break;
            }
        }
        assert!(freed, "spawned unlock should release the lease");
    }
}

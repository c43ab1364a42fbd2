use crate::Result;
use async_trait::async_trait;
use keyhole_core::{BulkShortCode, OwnerId, ShortCode, UrlRecord};

/// The surface other subsystems use to create and resolve short codes.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    /// Returns the code of `(long_url, owner)`, creating it on first use.
    async fn create_short_code(&self, long_url: &str, owner: Option<OwnerId>)
        -> Result<ShortCode>;

    /// Bulk variant of [`Resolver::create_short_code`], in input order.
    async fn create_short_codes(
        &self,
        long_urls: &[String],
        owner: Option<OwnerId>,
    ) -> Result<Vec<BulkShortCode>>;

    /// Resolves a short code to its long URL.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;

    /// Every record of `owner`, oldest first.
    async fn get_history_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRecord>>;
}

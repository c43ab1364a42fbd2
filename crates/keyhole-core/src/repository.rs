use crate::codec::IdOffset;
use crate::error::StorageError;
use crate::owner::OwnerId;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Store-assigned identity; the source of the short code.
    pub id: u64,
    /// The original URL that was shortened.
    pub long_url: String,
    /// The owner, or `None` for anonymous records.
    pub owner: Option<OwnerId>,
    /// The code derived from `id` and the id offset.
    pub short_code: ShortCode,
    pub created_at: Timestamp,
}

/// One element of a bulk find-or-create, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkShortCode {
    pub long_url: String,
    pub short_code: ShortCode,
}

/// Outcome of the insert phase of find-or-create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertAttempt {
    /// This caller inserted the row and assigned its code.
    Created(ShortCode),
    /// A concurrent caller holds the (long URL, owner) key; the winning row
    /// must be read outside the aborted transaction.
    Conflict,
}

/// Durable mapping of long URL to numeric identity to short code.
#[async_trait]
pub trait UrlRepository: Send + Sync + 'static {
    /// Returns the code already assigned to `(long_url, owner)`, assigning
    /// `id_offset.to_code(id)` to a freshly inserted row otherwise.
    ///
    /// Concurrent calls with the same pair converge on a single code.
    async fn find_or_create_short_code(
        &self,
        long_url: &str,
        id_offset: IdOffset,
        owner: Option<OwnerId>,
    ) -> Result<ShortCode>;

    /// Bulk variant of [`UrlRepository::find_or_create_short_code`].
    ///
    /// The result has one entry per input URL, in input order.
    async fn find_or_create_short_codes(
        &self,
        long_urls: &[String],
        id_offset: IdOffset,
        owner: Option<OwnerId>,
    ) -> Result<Vec<BulkShortCode>>;

    /// Returns `Err(NotFound)` if no record has this id.
    async fn get_by_id(&self, id: u64) -> Result<UrlRecord>;

    /// Returns every record of `owner` in creation order; empty if none.
    async fn get_history_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRecord>>;
}

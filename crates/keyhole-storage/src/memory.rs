use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use keyhole_core::repository::{BulkShortCode, InsertAttempt, Result, UrlRecord, UrlRepository};
use keyhole_core::{IdOffset, OwnerId, ShortCode, StorageError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Uniqueness key of a URL group. `owner: None` compares equal to itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    long_url: String,
    owner: Option<OwnerId>,
}

impl GroupKey {
    fn new(long_url: &str, owner: Option<OwnerId>) -> Self {
        Self {
            long_url: long_url.to_owned(),
            owner,
        }
    }
}

#[derive(Debug)]
struct Tables {
    next_id: AtomicU64,
    groups: DashMap<GroupKey, u64>,
    rows: DashMap<u64, UrlRecord>,
}

/// In-memory implementation of [`UrlRepository`] using DashMap.
///
/// The group index plays the role of the unique (long URL, owner) key: a
/// vacant entry is claimed under its shard lock, and the row is written with
/// its code before the claim becomes visible, so readers never observe a
/// code-less row. Clones share the same tables.
#[derive(Debug, Clone)]
pub struct InMemoryUrlRepository {
    tables: Arc<Tables>,
}

impl InMemoryUrlRepository {
    /// Creates a new in-memory repository. The first id assigned is 1.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tables: Arc::new(Tables {
                next_id: AtomicU64::new(1),
                groups: DashMap::with_capacity(capacity),
                rows: DashMap::with_capacity(capacity),
            }),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.tables.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.rows.is_empty()
    }

    fn find_or_create(
        &self,
        long_url: &str,
        id_offset: IdOffset,
        owner: Option<OwnerId>,
    ) -> Result<ShortCode> {
        let key = GroupKey::new(long_url, owner);

        if let Some(code) = self.lookup(&key) {
            return Ok(code);
        }

        match self.attempt_insert(key.clone(), id_offset)? {
            InsertAttempt::Created(code) => Ok(code),
            InsertAttempt::Conflict => self.read_winning_row(&key),
        }
    }

    fn lookup(&self, key: &GroupKey) -> Option<ShortCode> {
        let id = *self.tables.groups.get(key)?;
        self.tables
            .rows
            .get(&id)
            .map(|row| row.short_code.clone())
    }

    fn attempt_insert(&self, key: GroupKey, id_offset: IdOffset) -> Result<InsertAttempt> {
        match self.tables.groups.entry(key) {
            Entry::Occupied(_) => Ok(InsertAttempt::Conflict),
            Entry::Vacant(slot) => {
                let id = self.tables.next_id.fetch_add(1, Ordering::SeqCst);
                let short_code = id_offset.to_code(id).map_err(|e| {
                    StorageError::InvalidData(format!("cannot derive short code for id {id}: {e}"))
                })?;

                let key = slot.key();
                let record = UrlRecord {
                    id,
                    long_url: key.long_url.clone(),
                    owner: key.owner,
                    short_code: short_code.clone(),
                    created_at: Timestamp::now(),
                };
                self.tables.rows.insert(id, record);
                slot.insert(id);

                Ok(InsertAttempt::Created(short_code))
            }
        }
    }

    fn read_winning_row(&self, key: &GroupKey) -> Result<ShortCode> {
        self.lookup(key).ok_or_else(|| {
            StorageError::Query(format!(
                "conflicting row for '{}' disappeared before it could be read",
                key.long_url
            ))
        })
    }
}

impl Default for InMemoryUrlRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlRepository for InMemoryUrlRepository {
    async fn find_or_create_short_code(
        &self,
        long_url: &str,
        id_offset: IdOffset,
        owner: Option<OwnerId>,
    ) -> Result<ShortCode> {
        self.find_or_create(long_url, id_offset, owner)
    }

    async fn find_or_create_short_codes(
        &self,
        long_urls: &[String],
        id_offset: IdOffset,
        owner: Option<OwnerId>,
    ) -> Result<Vec<BulkShortCode>> {
        long_urls
            .iter()
            .map(|long_url| {
                let short_code = self.find_or_create(long_url, id_offset, owner)?;
                Ok(BulkShortCode {
                    long_url: long_url.clone(),
                    short_code,
                })
            })
            .collect()
    }

    async fn get_by_id(&self, id: u64) -> Result<UrlRecord> {
        self.tables
            .rows
            .get(&id)
            .map(|row| row.value().clone())
            .ok_or_else(|| StorageError::NotFound(format!("no url with id {id}")))
    }

    async fn get_history_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRecord>> {
        let mut records: Vec<UrlRecord> = self
            .tables
            .rows
            .iter()
            .filter(|row| row.owner == Some(owner))
            .map(|row| row.value().clone())
            .collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }
}

use async_trait::async_trait;
use jiff::Timestamp;
use keyhole_core::repository::{BulkShortCode, InsertAttempt, Result, UrlRecord, UrlRepository};
use keyhole_core::{IdOffset, OwnerId, ShortCode, StorageError};
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Acquire, MySql, MySqlPool, QueryBuilder, Row};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// MySQL implementation of the repository contract.
///
/// Rows are grouped by `(url_hash, owner_key)`, a unique key in which every
/// anonymous row shares the same owner key. Writes run in serializable
/// transactions; a concurrent insert of the same group surfaces either as a
/// duplicate-key error or as a deadlock victim, and both are treated as a
/// lost race that is settled by reading the winning row.
#[derive(Debug, Clone)]
pub struct MySqlUrlRepository {
    pool: MySqlPool,
}

impl MySqlUrlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Unavailable(format!("failed to apply migrations: {e}")))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Fresh read of the row that won a conflicting insert.
    ///
    /// Runs outside any transaction. The locking read waits for the winner
    /// to commit, so the row is observed together with its short code.
    async fn read_winning_row(&self, long_url: &str, owner: Option<OwnerId>) -> Result<ShortCode> {
        let row = sqlx::query(
            r#"
            SELECT short_code
            FROM short_urls
            WHERE url_hash = UNHEX(SHA2(?, 256))
              AND owner_id <=> ?
            FOR SHARE
            "#,
        )
        .bind(long_url)
        .bind(owner.map(OwnerId::get))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::Query(format!(
                "conflicting insert for '{long_url}' was rolled back"
            )));
        };

        let short_code: Option<String> = row.try_get("short_code").map_err(map_sqlx_error)?;
        short_code
            .ok_or_else(|| {
                StorageError::InvalidData(format!("winning row for '{long_url}' has no short code"))
            })
            .and_then(parse_short_code)
    }
}

fn now_unix_seconds() -> i64 {
    Timestamp::now().as_second()
}

fn parse_created_at(seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{}': {e}", seconds))
    })
}

fn parse_short_code(code: String) -> Result<ShortCode> {
    ShortCode::new(code).map_err(|e| StorageError::InvalidData(e.to_string()))
}

fn derive_short_code(id_offset: IdOffset, id: u64) -> Result<ShortCode> {
    id_offset
        .to_code(id)
        .map_err(|e| StorageError::InvalidData(format!("cannot derive short code for id {id}: {e}")))
}

fn record_from_row(row: &MySqlRow) -> Result<UrlRecord> {
    let id: u64 = row.try_get("id").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let owner_id: Option<i64> = row.try_get("owner_id").map_err(map_sqlx_error)?;
    let short_code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        id,
        long_url,
        owner: owner_id.map(OwnerId::new),
        short_code: parse_short_code(short_code)?,
        created_at: parse_created_at(created_at)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

/// SQLSTATE 40001: InnoDB picked this transaction as a deadlock victim.
fn is_serialization_failure(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "40001")
}

fn is_write_conflict(err: &sqlx::Error) -> bool {
    is_unique_violation(err) || is_serialization_failure(err)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::RowNotFound => StorageError::NotFound(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

/// The next transaction started on `conn` runs at SERIALIZABLE.
async fn set_serializable(conn: &mut MySqlConnection) -> Result<()> {
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok(())
}

/// Returns the code of an existing `(long_url, owner)` row, if any.
async fn lookup_short_code(
    conn: &mut MySqlConnection,
    long_url: &str,
    owner: Option<OwnerId>,
) -> Result<Option<ShortCode>> {
    let row = sqlx::query(
        r#"
        SELECT short_code
        FROM short_urls
        WHERE url_hash = UNHEX(SHA2(?, 256))
          AND owner_id <=> ?
        LIMIT 1
        "#,
    )
    .bind(long_url)
    .bind(owner.map(OwnerId::get))
    .fetch_optional(conn)
    .await
    .map_err(map_sqlx_error)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let short_code: Option<String> = row.try_get("short_code").map_err(map_sqlx_error)?;
    short_code.map(parse_short_code).transpose()
}

/// Inserts the row and assigns its code, or reports a lost race.
async fn attempt_insert(
    conn: &mut MySqlConnection,
    long_url: &str,
    id_offset: IdOffset,
    owner: Option<OwnerId>,
) -> Result<InsertAttempt> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO short_urls (long_url, owner_id, created_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(long_url)
    .bind(owner.map(OwnerId::get))
    .bind(now_unix_seconds())
    .execute(&mut *conn)
    .await;

    let id = match inserted {
        Ok(result) => result.last_insert_id(),
        Err(err) if is_write_conflict(&err) => {
            debug!(error = %err, "insert lost a race for the same url group");
            return Ok(InsertAttempt::Conflict);
        }
        Err(err) => return Err(map_sqlx_error(err)),
    };

    let short_code = derive_short_code(id_offset, id)?;
    sqlx::query("UPDATE short_urls SET short_code = ? WHERE id = ?")
        .bind(short_code.as_str())
        .bind(id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    Ok(InsertAttempt::Created(short_code))
}

fn unique_in_order(long_urls: &[String]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(long_urls.len());
    long_urls
        .iter()
        .map(String::as_str)
        .filter(|url| seen.insert(*url))
        .collect()
}

/// Distinct urls of a batch in the order their rows are locked.
///
/// Every bulk transaction inserts in the same (sorted) order, so two
/// overlapping batches queue on their first shared row instead of each
/// holding a row the other needs.
fn lock_order(long_urls: &[String]) -> Vec<&str> {
    let mut batch = unique_in_order(long_urls);
    batch.sort_unstable();
    batch
}

/// Bulk transactions are retried when picked as a deadlock victim.
const BULK_ATTEMPTS: u32 = 3;

enum BulkAttempt {
    Committed(HashMap<String, ShortCode>),
    Conflict,
}

/// Failure of one statement inside a bulk transaction.
enum BulkFailure {
    Sql(sqlx::Error),
    Storage(StorageError),
}

impl From<sqlx::Error> for BulkFailure {
    fn from(err: sqlx::Error) -> Self {
        BulkFailure::Sql(err)
    }
}

impl From<StorageError> for BulkFailure {
    fn from(err: StorageError) -> Self {
        BulkFailure::Storage(err)
    }
}

impl MySqlUrlRepository {
    /// One serializable pass over a sorted, de-duplicated batch.
    async fn attempt_bulk(
        &self,
        batch: &[&str],
        id_offset: IdOffset,
        owner: Option<OwnerId>,
    ) -> Result<BulkAttempt> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        set_serializable(&mut conn).await?;
        let mut tx = (&mut *conn).begin().await.map_err(map_sqlx_error)?;

        let failure = match bulk_statements(&mut tx, batch, id_offset, owner).await {
            Ok(codes) => match tx.commit().await {
                Ok(()) => return Ok(BulkAttempt::Committed(codes)),
                Err(err) if is_write_conflict(&err) => {
                    debug!(error = %err, "bulk commit lost a race");
                    return Ok(BulkAttempt::Conflict);
                }
                Err(err) => return Err(map_sqlx_error(err)),
            },
            Err(failure) => failure,
        };

        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "rollback of bulk transaction failed");
        }

        match failure {
            BulkFailure::Sql(err) if is_write_conflict(&err) => {
                debug!(error = %err, "bulk insert lost a race");
                Ok(BulkAttempt::Conflict)
            }
            BulkFailure::Sql(err) => Err(map_sqlx_error(err)),
            BulkFailure::Storage(err) => Err(err),
        }
    }
}

/// Insert, read back and assign codes for a batch inside `conn`'s
/// open transaction.
async fn bulk_statements(
    conn: &mut MySqlConnection,
    batch: &[&str],
    id_offset: IdOffset,
    owner: Option<OwnerId>,
) -> std::result::Result<HashMap<String, ShortCode>, BulkFailure> {
    let owner_id = owner.map(OwnerId::get);
    let now = now_unix_seconds();

    // 1. one multi-row insert; rows of existing groups are skipped
    let mut insert =
        QueryBuilder::<MySql>::new("INSERT INTO short_urls (long_url, owner_id, created_at) ");
    insert.push_values(batch.iter(), |mut row, url| {
        row.push_bind(*url).push_bind(owner_id).push_bind(now);
    });
    insert.push(" ON DUPLICATE KEY UPDATE id = id");
    insert.build().execute(&mut *conn).await?;

    // 2. one lookup of every group in the batch
    let mut select = QueryBuilder::<MySql>::new(
        "SELECT id, short_code, long_url FROM short_urls WHERE owner_id <=> ",
    );
    select.push_bind(owner_id);
    select.push(" AND url_hash IN (");
    let mut hashes = select.separated(", ");
    for url in batch {
        hashes.push("UNHEX(SHA2(");
        hashes.push_bind_unseparated(*url);
        hashes.push_unseparated(", 256))");
    }
    select.push(")");

    let rows = select.build().fetch_all(&mut *conn).await?;

    let mut codes: HashMap<String, ShortCode> = HashMap::with_capacity(rows.len());
    let mut pending: Vec<(u64, ShortCode)> = Vec::new();
    for row in &rows {
        let id: u64 = row.try_get("id")?;
        let long_url: String = row.try_get("long_url")?;
        let short_code: Option<String> = row.try_get("short_code")?;

        let short_code = match short_code {
            Some(code) => parse_short_code(code)?,
            None => {
                let code = derive_short_code(id_offset, id)?;
                pending.push((id, code.clone()));
                code
            }
        };
        codes.insert(long_url, short_code);
    }

    // 3. one assignment pass for the rows inserted above
    if !pending.is_empty() {
        let mut update = QueryBuilder::<MySql>::new("UPDATE short_urls SET short_code = CASE id");
        for (id, code) in &pending {
            update.push(" WHEN ");
            update.push_bind(*id);
            update.push(" THEN ");
            update.push_bind(code.as_str());
        }
        update.push(" END WHERE id IN (");
        let mut ids = update.separated(", ");
        for (id, _) in &pending {
            ids.push_bind(*id);
        }
        update.push(")");

        update.build().execute(&mut *conn).await?;
    }

    debug!(
        requested = batch.len(),
        created = pending.len(),
        "bulk statements applied"
    );

    Ok(codes)
}

#[async_trait]
impl UrlRepository for MySqlUrlRepository {
    async fn find_or_create_short_code(
        &self,
        long_url: &str,
        id_offset: IdOffset,
        owner: Option<OwnerId>,
    ) -> Result<ShortCode> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        set_serializable(&mut conn).await?;
        let mut tx = (&mut *conn).begin().await.map_err(map_sqlx_error)?;

        if let Some(code) = lookup_short_code(&mut tx, long_url, owner).await? {
            trace!(code = %code, "reusing existing short code");
            tx.commit().await.map_err(map_sqlx_error)?;
            return Ok(code);
        }

        match attempt_insert(&mut tx, long_url, id_offset, owner).await? {
            InsertAttempt::Created(code) => {
                tx.commit().await.map_err(map_sqlx_error)?;
                debug!(code = %code, "created short code");
                Ok(code)
            }
            InsertAttempt::Conflict => {
                // A deadlock victim is already rolled back server-side; the
                // explicit rollback only resets the connection state.
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "rollback after conflicting insert failed");
                }
                drop(conn);
                self.read_winning_row(long_url, owner).await
            }
        }
    }

    async fn find_or_create_short_codes(
        &self,
        long_urls: &[String],
        id_offset: IdOffset,
        owner: Option<OwnerId>,
    ) -> Result<Vec<BulkShortCode>> {
        let batch = lock_order(long_urls);
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 1;
        let codes = loop {
            match self.attempt_bulk(&batch, id_offset, owner).await? {
                BulkAttempt::Committed(codes) => break codes,
                BulkAttempt::Conflict if attempt < BULK_ATTEMPTS => {
                    debug!(attempt, "bulk insert lost a race, retrying");
                    attempt += 1;
                }
                BulkAttempt::Conflict => {
                    return Err(StorageError::Query(format!(
                        "bulk insert kept conflicting after {BULK_ATTEMPTS} attempts"
                    )));
                }
            }
        };

        long_urls
            .iter()
            .map(|long_url| {
                let short_code = codes.get(long_url).cloned().ok_or_else(|| {
                    StorageError::InvalidData(format!("no row found for '{long_url}' after insert"))
                })?;
                Ok(BulkShortCode {
                    long_url: long_url.clone(),
                    short_code,
                })
            })
            .collect()
    }

    async fn get_by_id(&self, id: u64) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, long_url, owner_id, short_code, created_at
            FROM short_urls
            WHERE id = ?
              AND short_code IS NOT NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StorageError::NotFound(format!("no url with id {id}"))),
        }
    }

    async fn get_history_by_owner(&self, owner: OwnerId) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, long_url, owner_id, short_code, created_at
            FROM short_urls
            WHERE owner_id = ?
              AND short_code IS NOT NULL
            ORDER BY id
            "#,
        )
        .bind(owner.get())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_in_order_keeps_first_occurrence() {
        let urls = vec![
            "https://b.example".to_string(),
            "https://a.example".to_string(),
            "https://b.example".to_string(),
        ];
        assert_eq!(
            unique_in_order(&urls),
            ["https://b.example", "https://a.example"]
        );
    }

    #[test]
    fn overlapping_batches_share_one_lock_order() {
        let forward = vec![
            "https://a.example".to_string(),
            "https://b.example".to_string(),
            "https://c.example".to_string(),
        ];
        let reversed: Vec<String> = forward.iter().rev().cloned().collect();
        let repeated = vec![
            "https://c.example".to_string(),
            "https://a.example".to_string(),
            "https://c.example".to_string(),
            "https://b.example".to_string(),
        ];

        assert_eq!(lock_order(&forward), lock_order(&reversed));
        assert_eq!(lock_order(&forward), lock_order(&repeated));
        assert_eq!(
            lock_order(&reversed),
            ["https://a.example", "https://b.example", "https://c.example"]
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(map_sqlx_error(sqlx::Error::RowNotFound).is_not_found());
    }

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StorageError::Timeout(_)
        ));
    }

    #[test]
    fn pool_closed_maps_to_unavailable() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            StorageError::Unavailable(_)
        ));
    }
}

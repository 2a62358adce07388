//! Outbound queue persisted in the `syncQueue` collection.
//!
//! Each item records one mutation made while offline. Items are delivered in
//! enqueue order, retried on failure and parked as terminally failed once the
//! retry budget is spent. Delivered items are deleted.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use salesdesk_core::RecordId;

use crate::store::{LocalStore, StoreError};
use crate::types::{EntityType, QueueCounts, QueueItem, QueueItemId, QueuePayload, QueueStatus};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue item {0} not found")]
    QueueItemNotFound(QueueItemId),
    #[error("queue item {id} exceeded the retry budget after {attempts} attempts")]
    MaxRetriesExceeded { id: QueueItemId, attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        QueueError::Store(StoreError::StorageIo(err))
    }
}

const SELECT_ITEM: &str = r#"
    SELECT id, payload, enqueued_at, retry_count, status, last_error
    FROM sync_queue
"#;

/// SQLite-backed outbound queue.
///
/// This struct is cheap to clone and shares the store's connection pool.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    store: LocalStore,
    max_retry_attempts: u32,
}

// Operations that change queue counts are crate-internal: callers go through
// `SyncEngine`, which broadcasts the new status.
impl OutboundQueue {
    pub fn new(store: LocalStore, max_retry_attempts: u32) -> Self {
        Self {
            store,
            max_retry_attempts,
        }
    }

    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }

    /// Append a pending item. Does not attempt delivery.
    pub(crate) async fn enqueue(&self, payload: QueuePayload) -> QueueResult<QueueItem> {
        let pool = self.store.pool().await?;
        let mut conn = pool.acquire().await?;
        let item = insert_item(&mut conn, payload, Utc::now()).await?;

        tracing::debug!(
            item_id = %item.id,
            entity = %item.entity_type(),
            action = %item.action(),
            "enqueued mutation"
        );
        Ok(item)
    }

    /// Pending items in delivery (FIFO) order.
    pub async fn list_pending(&self) -> QueueResult<Vec<QueueItem>> {
        self.list_by_status(QueueStatus::Pending).await
    }

    /// Terminally failed items awaiting an operator.
    pub async fn list_failed(&self) -> QueueResult<Vec<QueueItem>> {
        self.list_by_status(QueueStatus::Failed).await
    }

    /// Every persisted item regardless of status.
    pub async fn list_all(&self) -> QueueResult<Vec<QueueItem>> {
        let pool = self.store.pool().await?;
        let sql = format!("{SELECT_ITEM} ORDER BY enqueued_at ASC, id ASC");
        let rows = sqlx::query(&sql).fetch_all(&pool).await?;
        rows.into_iter().map(row_to_item).collect()
    }

    async fn list_by_status(&self, status: QueueStatus) -> QueueResult<Vec<QueueItem>> {
        let pool = self.store.pool().await?;
        let sql = format!("{SELECT_ITEM} WHERE status = ?1 ORDER BY enqueued_at ASC, id ASC");
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&pool)
            .await?;
        rows.into_iter().map(row_to_item).collect()
    }

    pub async fn get(&self, id: QueueItemId) -> QueueResult<QueueItem> {
        let pool = self.store.pool().await?;
        let mut conn = pool.acquire().await?;
        fetch_item(&mut conn, id).await
    }

    pub(crate) async fn mark_in_flight(&self, id: QueueItemId) -> QueueResult<()> {
        self.set_status(id, QueueStatus::InFlight).await
    }

    /// Delivery succeeded: the item leaves the queue.
    pub(crate) async fn mark_completed(&self, id: QueueItemId) -> QueueResult<()> {
        let pool = self.store.pool().await?;
        let mut conn = pool.acquire().await?;
        complete_item(&mut conn, id).await
    }

    /// Record a failed delivery attempt.
    ///
    /// Increments `retry_count` and stores the error. The item goes back to
    /// `pending` until the count reaches the retry budget, then it is parked as
    /// terminally `failed`.
    pub(crate) async fn mark_failed(&self, id: QueueItemId, error: &str) -> QueueResult<QueueItem> {
        let pool = self.store.pool().await?;
        let result = sqlx::query(
            r#"
            UPDATE sync_queue
            SET retry_count = retry_count + 1,
                last_error = ?2,
                status = CASE WHEN retry_count + 1 >= ?3 THEN 'failed' ELSE 'pending' END
            WHERE id = ?1
            "#,
        )
        .bind(id.0)
        .bind(error)
        .bind(i64::from(self.max_retry_attempts))
        .execute(&pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::QueueItemNotFound(id));
        }

        let mut conn = pool.acquire().await?;
        let item = fetch_item(&mut conn, id).await?;
        if item.status == QueueStatus::Failed {
            tracing::error!(
                item_id = %id,
                retry_count = item.retry_count,
                error,
                "queue item exhausted its retry budget"
            );
        } else {
            tracing::warn!(
                item_id = %id,
                retry_count = item.retry_count,
                error,
                "queue item delivery failed"
            );
        }
        Ok(item)
    }

    /// Park an item as terminally failed without counting another attempt.
    pub(crate) async fn mark_terminal(&self, id: QueueItemId) -> QueueResult<QueueItem> {
        let mut item = self.get(id).await?;
        let reason = QueueError::MaxRetriesExceeded {
            id,
            attempts: item.retry_count,
        }
        .to_string();

        let pool = self.store.pool().await?;
        sqlx::query("UPDATE sync_queue SET status = 'failed', last_error = ?2 WHERE id = ?1")
            .bind(id.0)
            .bind(&reason)
            .execute(&pool)
            .await?;

        tracing::error!(item_id = %id, retry_count = item.retry_count, "{reason}");
        item.status = QueueStatus::Failed;
        item.last_error = Some(reason);
        Ok(item)
    }

    /// Reset items left `in_flight` by an interrupted pass back to `pending`.
    pub(crate) async fn recover_in_flight(&self) -> QueueResult<u64> {
        let pool = self.store.pool().await?;
        let result = sqlx::query("UPDATE sync_queue SET status = 'pending' WHERE status = 'in_flight'")
            .execute(&pool)
            .await?;

        let recovered = result.rows_affected();
        if recovered > 0 {
            tracing::info!(recovered, "recovered interrupted queue items");
        }
        Ok(recovered)
    }

    /// Give a terminally failed item a fresh retry budget.
    pub(crate) async fn retry_failed(&self, id: QueueItemId) -> QueueResult<QueueItem> {
        let pool = self.store.pool().await?;
        let result = sqlx::query(
            "UPDATE sync_queue SET status = 'pending', retry_count = 0 WHERE id = ?1 AND status = 'failed'",
        )
        .bind(id.0)
        .execute(&pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::QueueItemNotFound(id));
        }
        tracing::info!(item_id = %id, "failed queue item re-queued");
        self.get(id).await
    }

    /// Drop an item without delivering it.
    pub(crate) async fn discard(&self, id: QueueItemId) -> QueueResult<()> {
        self.mark_completed(id).await?;
        tracing::info!(item_id = %id, "queue item discarded");
        Ok(())
    }

    pub async fn counts(&self) -> QueueResult<QueueCounts> {
        let pool = self.store.pool().await?;
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM sync_queue GROUP BY status")
            .fetch_all(&pool)
            .await?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            match QueueStatus::parse(&status) {
                Some(QueueStatus::Pending) => counts.pending = n as u64,
                Some(QueueStatus::InFlight) => counts.in_flight = n as u64,
                Some(QueueStatus::Failed) => counts.failed = n as u64,
                Some(QueueStatus::Completed) | None => {
                    tracing::warn!(status = %status, "unexpected queue status in store");
                }
            }
        }
        Ok(counts)
    }

    async fn set_status(&self, id: QueueItemId, status: QueueStatus) -> QueueResult<()> {
        let pool = self.store.pool().await?;
        let result = sqlx::query("UPDATE sync_queue SET status = ?2 WHERE id = ?1")
            .bind(id.0)
            .bind(status.as_str())
            .execute(&pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::QueueItemNotFound(id));
        }
        Ok(())
    }
}

/// Insert a pending item on an open connection or transaction.
pub(crate) async fn insert_item(
    conn: &mut SqliteConnection,
    payload: QueuePayload,
    now: DateTime<Utc>,
) -> QueueResult<QueueItem> {
    let encoded = serde_json::to_string(&payload).map_err(StoreError::from)?;

    let result = sqlx::query(
        r#"
        INSERT INTO sync_queue (
            entity_type,
            action,
            record_id,
            payload,
            enqueued_at,
            retry_count,
            status,
            last_error
        )
        VALUES (?1, ?2, ?3, ?4, ?5, 0, 'pending', NULL)
        "#,
    )
    .bind(payload.entity_type().as_str())
    .bind(payload.action().as_str())
    .bind(payload.record_id().as_str())
    .bind(encoded)
    .bind(now.to_rfc3339_opts(SecondsFormat::Micros, true))
    .execute(&mut *conn)
    .await?;

    Ok(QueueItem {
        id: QueueItemId(result.last_insert_rowid()),
        payload,
        enqueued_at: now,
        retry_count: 0,
        status: QueueStatus::Pending,
        last_error: None,
    })
}

/// Pending items of one record, oldest first.
pub(crate) async fn pending_for_record(
    conn: &mut SqliteConnection,
    entity_type: EntityType,
    record_id: &RecordId,
) -> QueueResult<Vec<QueueItem>> {
    let sql = format!(
        "{SELECT_ITEM} WHERE entity_type = ?1 AND record_id = ?2 AND status = 'pending' \
         ORDER BY enqueued_at ASC, id ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(entity_type.as_str())
        .bind(record_id.as_str())
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(row_to_item).collect()
}

/// Pending and in-flight items of one entity type.
pub(crate) async fn unfinished_of(
    conn: &mut SqliteConnection,
    entity_type: EntityType,
) -> QueueResult<Vec<QueueItem>> {
    let sql = format!(
        "{SELECT_ITEM} WHERE entity_type = ?1 AND status IN ('pending', 'in_flight') \
         ORDER BY enqueued_at ASC, id ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(entity_type.as_str())
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(row_to_item).collect()
}

/// Keys of records of one entity type whose changes the ERP has not received.
///
/// Covers pending, in-flight and terminally failed items.
pub(crate) async fn undelivered_record_ids(
    conn: &mut SqliteConnection,
    entity_type: EntityType,
) -> QueueResult<HashSet<String>> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT record_id FROM sync_queue WHERE entity_type = ?1")
            .bind(entity_type.as_str())
            .fetch_all(&mut *conn)
            .await?;
    Ok(ids.into_iter().collect())
}

/// Rewrite the payload of an existing item, keeping its position.
pub(crate) async fn replace_payload(
    conn: &mut SqliteConnection,
    id: QueueItemId,
    payload: &QueuePayload,
) -> QueueResult<()> {
    let encoded = serde_json::to_string(payload).map_err(StoreError::from)?;
    let result = sqlx::query(
        "UPDATE sync_queue SET payload = ?2, action = ?3, record_id = ?4 WHERE id = ?1",
    )
    .bind(id.0)
    .bind(encoded)
    .bind(payload.action().as_str())
    .bind(payload.record_id().as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(QueueError::QueueItemNotFound(id));
    }
    Ok(())
}

/// Delete an item; fails when it does not exist.
pub(crate) async fn complete_item(conn: &mut SqliteConnection, id: QueueItemId) -> QueueResult<()> {
    let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(QueueError::QueueItemNotFound(id));
    }
    Ok(())
}

async fn fetch_item(conn: &mut SqliteConnection, id: QueueItemId) -> QueueResult<QueueItem> {
    let sql = format!("{SELECT_ITEM} WHERE id = ?1");
    let row = sqlx::query(&sql)
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(QueueError::QueueItemNotFound(id))?;
    row_to_item(row)
}

fn corrupt(reason: impl Into<String>) -> QueueError {
    QueueError::Store(StoreError::Corrupt {
        table: "sync_queue",
        reason: reason.into(),
    })
}

fn row_to_item(row: SqliteRow) -> QueueResult<QueueItem> {
    let id: i64 = row.try_get("id")?;
    let payload: String = row.try_get("payload")?;
    let enqueued_at: String = row.try_get("enqueued_at")?;
    let retry_count: i64 = row.try_get("retry_count")?;
    let status: String = row.try_get("status")?;
    let last_error: Option<String> = row.try_get("last_error")?;

    let payload: QueuePayload = serde_json::from_str(&payload)
        .map_err(|e| corrupt(format!("item {id}: invalid payload: {e}")))?;
    let enqueued_at = DateTime::parse_from_rfc3339(&enqueued_at)
        .map_err(|e| corrupt(format!("item {id}: invalid enqueued_at: {e}")))?
        .with_timezone(&Utc);
    let status = QueueStatus::parse(&status)
        .ok_or_else(|| corrupt(format!("item {id}: invalid status {status}")))?;
    let retry_count = u32::try_from(retry_count)
        .map_err(|_| corrupt(format!("item {id}: invalid retry_count {retry_count}")))?;

    Ok(QueueItem {
        id: QueueItemId(id),
        payload,
        enqueued_at,
        retry_count,
        status,
        last_error,
    })
}

//! Durable local store for offline support.
//!
//! One SQLite database holds four independent collections: `orders`,
//! `customers`, `products` and `syncQueue`. Cached records are stored as JSON
//! next to one column per secondary index so point lookups, scans and index
//! queries never need to decode unrelated rows.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;

use salesdesk_core::{Entity, RecordId};
use salesdesk_parties::Customer;
use salesdesk_products::Product;
use salesdesk_sales::Order;

/// Result type of local store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Local store failures. Never retried by the store itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("local storage is unavailable: {0}")]
    StorageUnavailable(String),
    #[error("local store used before open_or_create")]
    NotInitialized,
    #[error("local storage I/O failed: {0}")]
    StorageIo(#[from] sqlx::Error),
    #[error("requested schema version {requested} is older than stored version {stored}")]
    VersionMismatch { stored: u32, requested: u32 },
    #[error("invalid schema version {0}")]
    InvalidVersion(u32),
    #[error("invalid database name '{0}'")]
    InvalidName(String),
    #[error("collection '{collection}' has no index named '{index}'")]
    UnknownIndex {
        collection: &'static str,
        index: String,
    },
    #[error("record encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

/// The four collections of the local database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Orders,
    Customers,
    Products,
    SyncQueue,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Orders,
        Collection::Customers,
        Collection::Products,
        Collection::SyncQueue,
    ];

    /// Collection name as exposed to callers.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Customers => "customers",
            Collection::Products => "products",
            Collection::SyncQueue => "syncQueue",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            Collection::Orders => "orders",
            Collection::Customers => "customers",
            Collection::Products => "products",
            Collection::SyncQueue => "sync_queue",
        }
    }

    /// `(index name, column)` pairs of the secondary indexes.
    pub(crate) fn index_columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Collection::Orders => &[
                ("customerId", "customer_id"),
                ("date", "order_date"),
                ("syncStatus", "sync_status"),
            ],
            Collection::Customers => &[("email", "email"), ("status", "status")],
            Collection::Products => &[("sku", "sku"), ("category", "category")],
            Collection::SyncQueue => &[("status", "status"), ("enqueuedAt", "enqueued_at")],
        }
    }

    /// Names of the secondary indexes declared by this collection.
    pub fn indexes(&self) -> Vec<&'static str> {
        self.index_columns().iter().map(|(name, _)| *name).collect()
    }

    fn column_for(&self, index: &str) -> StoreResult<&'static str> {
        self.index_columns()
            .iter()
            .find(|(name, _)| *name == index)
            .map(|(_, column)| *column)
            .ok_or_else(|| StoreError::UnknownIndex {
                collection: self.name(),
                index: index.to_string(),
            })
    }
}

impl core::fmt::Display for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// A domain record materialized in one of the cached collections.
pub trait CachedRecord:
    Entity + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static
{
    const COLLECTION: Collection;

    /// Values of the collection's secondary indexes, in declaration order.
    fn index_values(&self) -> Vec<Option<String>>;
}

impl CachedRecord for Order {
    const COLLECTION: Collection = Collection::Orders;

    fn index_values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.customer_id.to_string()),
            Some(self.date.format("%Y-%m-%d").to_string()),
            Some(self.sync_status.as_str().to_string()),
        ]
    }
}

impl CachedRecord for Customer {
    const COLLECTION: Collection = Collection::Customers;

    fn index_values(&self) -> Vec<Option<String>> {
        vec![
            Some(self.email.clone()),
            Some(self.status.as_str().to_string()),
        ]
    }
}

impl CachedRecord for Product {
    const COLLECTION: Collection = Collection::Products;

    fn index_values(&self) -> Vec<Option<String>> {
        vec![Some(self.sku.clone()), Some(self.category.clone())]
    }
}

#[derive(Debug, Clone)]
enum Backend {
    /// `<dir>/<name>.db`; `None` resolves the OS data directory.
    Disk { dir: Option<PathBuf> },
    /// Private in-memory database (tests, previews).
    Memory,
}

#[derive(Debug, Clone)]
struct OpenState {
    pool: SqlitePool,
    name: String,
    version: u32,
}

/// SQLite-backed local store.
///
/// This struct is cheap to clone and is safe to share across threads. Every
/// operation fails with [`StoreError::NotInitialized`] until
/// [`LocalStore::open_or_create`] has completed.
#[derive(Debug, Clone)]
pub struct LocalStore {
    state: Arc<Mutex<Option<OpenState>>>,
    backend: Backend,
}

impl LocalStore {
    /// Store persisted under `dir` (or the OS app data directory).
    pub fn on_disk(dir: Option<PathBuf>) -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
            backend: Backend::Disk { dir },
        }
    }

    /// Store kept in memory for the lifetime of the handle.
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
            backend: Backend::Memory,
        }
    }

    /// Open the named database, provisioning collections and indexes on first
    /// creation or when `version` is higher than the stored schema version.
    ///
    /// Idempotent: calling it again on an open store only re-checks the version.
    pub async fn open_or_create(&self, name: &str, version: u32) -> StoreResult<()> {
        if version == 0 {
            return Err(StoreError::InvalidVersion(version));
        }
        validate_name(name)?;

        let mut guard = self.state.lock().await;
        let pool = match guard.as_ref() {
            Some(open) if open.name == name => open.pool.clone(),
            Some(open) => {
                tracing::info!(from = %open.name, to = %name, "switching local database");
                open.pool.close().await;
                self.connect(name).await?
            }
            None => self.connect(name).await?,
        };

        let version = ensure_schema(&pool, version).await?;
        *guard = Some(OpenState {
            pool,
            name: name.to_string(),
            version,
        });
        Ok(())
    }

    async fn connect(&self, name: &str) -> StoreResult<SqlitePool> {
        match &self.backend {
            Backend::Memory => {
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;

                // One long-lived connection: the database dies with it.
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
                    .map_err(|e| StoreError::StorageUnavailable(e.to_string()))
            }
            Backend::Disk { dir } => {
                let path = database_path(dir.as_deref(), name)?;
                let options = SqliteConnectOptions::new()
                    .filename(&path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Full);

                tracing::debug!(path = %path.display(), "opening local store");

                SqlitePoolOptions::new()
                    .max_connections(4)
                    .connect_with(options)
                    .await
                    .map_err(|e| {
                        StoreError::StorageUnavailable(format!(
                            "failed to open SQLite database at {}: {e}",
                            path.display()
                        ))
                    })
            }
        }
    }

    /// Get the pool of an opened store.
    pub(crate) async fn pool(&self) -> StoreResult<SqlitePool> {
        let guard = self.state.lock().await;
        guard
            .as_ref()
            .map(|open| open.pool.clone())
            .ok_or(StoreError::NotInitialized)
    }

    /// Start a transaction spanning several collections.
    pub async fn begin(&self) -> StoreResult<Transaction<'static, Sqlite>> {
        Ok(self.pool().await?.begin().await?)
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Schema version of the open database.
    pub async fn schema_version(&self) -> StoreResult<u32> {
        let guard = self.state.lock().await;
        guard
            .as_ref()
            .map(|open| open.version)
            .ok_or(StoreError::NotInitialized)
    }

    /// Close the database; later operations fail with `NotInitialized`.
    pub async fn close(&self) {
        if let Some(open) = self.state.lock().await.take() {
            open.pool.close().await;
        }
    }

    /// Upsert a record by primary key. Last writer wins.
    pub async fn put<R: CachedRecord>(&self, record: &R) -> StoreResult<()> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        put_record(&mut conn, record).await
    }

    /// Upsert a batch of records in one transaction.
    pub async fn put_many<R: CachedRecord>(&self, records: &[R]) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        for record in records {
            put_record(&mut tx, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All records of a collection in first-insertion order (snapshot).
    pub async fn get_all<R: CachedRecord>(&self) -> StoreResult<Vec<R>> {
        let pool = self.pool().await?;
        let sql = format!(
            "SELECT data FROM {} ORDER BY seq ASC",
            R::COLLECTION.table()
        );
        let rows = sqlx::query(&sql).fetch_all(&pool).await?;
        decode_rows(R::COLLECTION, rows)
    }

    /// Point lookup; `None` when the key is absent.
    pub async fn get_by_id<R: CachedRecord>(&self, id: &RecordId) -> StoreResult<Option<R>> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        get_record(&mut conn, id).await
    }

    /// Remove a record; no-op when absent.
    pub async fn delete_by_id(&self, collection: Collection, key: &str) -> StoreResult<()> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        delete_record(&mut conn, collection, key).await
    }

    /// Records whose secondary index `index` equals `value`, in insertion order.
    pub async fn query_by_index<R: CachedRecord>(
        &self,
        index: &str,
        value: &str,
    ) -> StoreResult<Vec<R>> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        query_records(&mut conn, index, value).await
    }

    /// Remove every record of a collection.
    pub async fn clear(&self, collection: Collection) -> StoreResult<()> {
        let pool = self.pool().await?;
        let sql = format!("DELETE FROM {}", collection.table());
        sqlx::query(&sql).execute(&pool).await?;
        tracing::debug!(collection = %collection, "cleared collection");
        Ok(())
    }

    pub async fn count(&self, collection: Collection) -> StoreResult<u64> {
        let pool = self.pool().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&pool).await?;
        Ok(count as u64)
    }
}

pub(crate) async fn put_record<R: CachedRecord>(
    conn: &mut SqliteConnection,
    record: &R,
) -> StoreResult<()> {
    let collection = R::COLLECTION;
    let columns = collection.index_columns();
    let values = record.index_values();
    debug_assert_eq!(columns.len(), values.len());

    let column_list = columns
        .iter()
        .map(|(_, column)| *column)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (0..columns.len())
        .map(|i| format!("?{}", i + 3))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = columns
        .iter()
        .map(|(_, column)| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    // Upsert keeps the original `seq`, so scans stay in first-insertion order.
    let sql = format!(
        "INSERT INTO {table} (id, data, {column_list}) VALUES (?1, ?2, {placeholders}) \
         ON CONFLICT(id) DO UPDATE SET data = excluded.data, {updates}",
        table = collection.table(),
    );

    let data = serde_json::to_string(record)?;
    let mut query = sqlx::query(&sql).bind(record.id().to_string()).bind(data);
    for value in values {
        query = query.bind(value);
    }
    query.execute(&mut *conn).await?;
    Ok(())
}

pub(crate) async fn all_records<R: CachedRecord>(conn: &mut SqliteConnection) -> StoreResult<Vec<R>> {
    let sql = format!("SELECT data FROM {} ORDER BY seq ASC", R::COLLECTION.table());
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    decode_rows(R::COLLECTION, rows)
}

pub(crate) async fn get_record<R: CachedRecord>(
    conn: &mut SqliteConnection,
    id: &RecordId,
) -> StoreResult<Option<R>> {
    let sql = format!("SELECT data FROM {} WHERE id = ?1", R::COLLECTION.table());
    let row = sqlx::query(&sql)
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(decode_rows(R::COLLECTION, vec![row])?.pop()),
        None => Ok(None),
    }
}

pub(crate) async fn delete_record(
    conn: &mut SqliteConnection,
    collection: Collection,
    key: &str,
) -> StoreResult<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", collection.table());
    sqlx::query(&sql).bind(key).execute(&mut *conn).await?;
    Ok(())
}

pub(crate) async fn query_records<R: CachedRecord>(
    conn: &mut SqliteConnection,
    index: &str,
    value: &str,
) -> StoreResult<Vec<R>> {
    let column = R::COLLECTION.column_for(index)?;
    let sql = format!(
        "SELECT data FROM {} WHERE {column} = ?1 ORDER BY seq ASC",
        R::COLLECTION.table()
    );
    let rows = sqlx::query(&sql).bind(value).fetch_all(&mut *conn).await?;
    decode_rows(R::COLLECTION, rows)
}

fn decode_rows<R: CachedRecord>(collection: Collection, rows: Vec<SqliteRow>) -> StoreResult<Vec<R>> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let data: String = row.try_get("data")?;
        let record = serde_json::from_str(&data).map_err(|e| StoreError::Corrupt {
            table: collection.table(),
            reason: e.to_string(),
        })?;
        records.push(record);
    }
    Ok(records)
}

const SYNC_QUEUE_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS sync_queue (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_type TEXT NOT NULL,
        action      TEXT NOT NULL,
        record_id   TEXT NOT NULL,
        payload     TEXT NOT NULL,
        enqueued_at TEXT NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0,
        status      TEXT NOT NULL,
        last_error  TEXT NULL
    )
"#;

fn schema_statements() -> Vec<String> {
    let mut statements = Vec::new();

    for collection in Collection::ALL {
        let table = collection.table();
        if collection == Collection::SyncQueue {
            statements.push(SYNC_QUEUE_DDL.to_string());
            statements.push(
                "CREATE INDEX IF NOT EXISTS idx_sync_queue_record_id ON sync_queue (record_id)"
                    .to_string(),
            );
        } else {
            let columns = collection
                .index_columns()
                .iter()
                .map(|(_, column)| format!("{column} TEXT NULL"))
                .collect::<Vec<_>>()
                .join(", ");
            statements.push(format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 seq INTEGER PRIMARY KEY AUTOINCREMENT, \
                 id TEXT NOT NULL UNIQUE, \
                 data TEXT NOT NULL, \
                 {columns})"
            ));
        }

        for (_, column) in collection.index_columns() {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column})"
            ));
        }
    }

    statements
}

/// Bring the schema up to `version`; returns the version in effect.
async fn ensure_schema(pool: &SqlitePool, version: u32) -> StoreResult<u32> {
    let mut tx = pool.begin().await?;

    let stored: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *tx)
        .await?;
    let stored = u32::try_from(stored).map_err(|_| StoreError::Corrupt {
        table: "pragma",
        reason: format!("user_version {stored} out of range"),
    })?;

    if stored > version {
        return Err(StoreError::VersionMismatch {
            stored,
            requested: version,
        });
    }

    if stored < version {
        for statement in schema_statements() {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        sqlx::query(&format!("PRAGMA user_version = {version}"))
            .execute(&mut *tx)
            .await?;
        tracing::info!(from = stored, to = version, "provisioned local store schema");
    }

    tx.commit().await?;
    Ok(version)
}

fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Resolve the path to the SQLite database file.
///
/// Without an explicit directory this is `{app_data_dir}/salesdesk/{name}.db`.
fn database_path(dir: Option<&Path>, name: &str) -> StoreResult<PathBuf> {
    let mut path = match dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let mut base = dirs::data_dir()
                .or_else(|| {
                    dirs::home_dir().map(|mut h| {
                        h.push(".local");
                        h.push("share");
                        h
                    })
                })
                .ok_or_else(|| {
                    StoreError::StorageUnavailable(
                        "no app data directory (tried data_dir() and home_dir()/.local/share)"
                            .to_string(),
                    )
                })?;
            base.push("salesdesk");
            base
        }
    };

    std::fs::create_dir_all(&path).map_err(|e| {
        StoreError::StorageUnavailable(format!(
            "failed to create store directory at {}: {e}",
            path.display()
        ))
    })?;

    path.push(format!("{name}.db"));
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use salesdesk_core::SyncMarker;
    use salesdesk_parties::CustomerStatus;
    use salesdesk_sales::{OrderDraft, OrderLineDraft, OrderStatus};

    async fn open_store() -> LocalStore {
        let store = LocalStore::in_memory();
        store.open_or_create("test", 1).await.unwrap();
        store
    }

    fn customer(id: &str, email: &str, status: CustomerStatus) -> Customer {
        Customer {
            id: RecordId::remote(id),
            name: format!("Customer {id}"),
            email: email.to_string(),
            phone: None,
            address: None,
            status,
            created_at: Utc::now(),
            sync_status: SyncMarker::Synced,
        }
    }

    fn product(id: &str, sku: &str, category: &str) -> Product {
        Product {
            id: RecordId::remote(id),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            category: category.to_string(),
            unit_price: 1_000,
            stock: 10,
            active: true,
            updated_at: Utc::now(),
            sync_status: SyncMarker::Synced,
        }
    }

    fn order(id: &str, customer_id: &str, marker: SyncMarker) -> Order {
        OrderDraft {
            customer_id: RecordId::remote(customer_id),
            date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            lines: vec![OrderLineDraft {
                product_id: RecordId::remote("P-1"),
                sku: "SKU-1".to_string(),
                description: "Widget".to_string(),
                quantity: 1,
                unit_price: 100,
                discount_bps: 0,
            }],
            notes: None,
        }
        .into_order(
            RecordId::remote(id),
            format!("SO-{id}"),
            OrderStatus::Confirmed,
            marker,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn operations_before_open_fail_not_initialized() {
        let store = LocalStore::in_memory();

        let err = store.get_all::<Customer>().await.unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));

        let err = store
            .put(&customer("C-1", "a@b.co", CustomerStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
    }

    #[tokio::test]
    async fn open_provisions_collections_and_is_idempotent() {
        let store = open_store().await;
        assert_eq!(store.schema_version().await.unwrap(), 1);

        for collection in Collection::ALL {
            assert_eq!(store.count(collection).await.unwrap(), 0);
        }

        store
            .put(&customer("C-1", "a@b.co", CustomerStatus::Active))
            .await
            .unwrap();
        store.open_or_create("test", 1).await.unwrap();
        assert_eq!(store.count(Collection::Customers).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn version_bump_keeps_data_and_downgrade_is_rejected() {
        let store = open_store().await;
        store
            .put(&product("P-1", "SKU-1", "Tools"))
            .await
            .unwrap();

        store.open_or_create("test", 2).await.unwrap();
        assert_eq!(store.schema_version().await.unwrap(), 2);
        assert_eq!(store.count(Collection::Products).await.unwrap(), 1);

        let err = store.open_or_create("test", 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch {
                stored: 2,
                requested: 1
            }
        ));
    }

    #[tokio::test]
    async fn invalid_versions_and_names_are_rejected() {
        let store = LocalStore::in_memory();
        assert!(matches!(
            store.open_or_create("test", 0).await,
            Err(StoreError::InvalidVersion(0))
        ));
        assert!(matches!(
            store.open_or_create("../escape", 1).await,
            Err(StoreError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn put_overwrites_and_keeps_insertion_order() {
        let store = open_store().await;

        store
            .put(&customer("C-1", "one@acme.com", CustomerStatus::Active))
            .await
            .unwrap();
        store
            .put(&customer("C-2", "two@acme.com", CustomerStatus::Active))
            .await
            .unwrap();
        store
            .put(&customer("C-1", "renamed@acme.com", CustomerStatus::Inactive))
            .await
            .unwrap();

        let all: Vec<Customer> = store.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id.as_str(), "C-1");
        assert_eq!(all[0].email, "renamed@acme.com");
        assert_eq!(all[1].id.as_str(), "C-2");

        let by_email: Vec<Customer> = store
            .query_by_index("email", "one@acme.com")
            .await
            .unwrap();
        assert!(by_email.is_empty());
    }

    #[tokio::test]
    async fn get_by_id_and_delete() {
        let store = open_store().await;
        let p = product("P-1", "SKU-1", "Tools");
        store.put(&p).await.unwrap();

        let found: Option<Product> = store.get_by_id(&p.id).await.unwrap();
        assert_eq!(found, Some(p.clone()));

        store
            .delete_by_id(Collection::Products, p.id.as_str())
            .await
            .unwrap();
        let gone: Option<Product> = store.get_by_id(&p.id).await.unwrap();
        assert!(gone.is_none());

        // Absent keys are a no-op.
        store
            .delete_by_id(Collection::Products, "missing")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn query_by_secondary_indexes() {
        let store = open_store().await;
        store
            .put_many(&[
                product("P-1", "SKU-1", "Tools"),
                product("P-2", "SKU-2", "Garden"),
                product("P-3", "SKU-3", "Tools"),
            ])
            .await
            .unwrap();
        store
            .put_many(&[
                order("O-1", "C-1", SyncMarker::Synced),
                order("O-2", "C-2", SyncMarker::Pending),
                order("O-3", "C-1", SyncMarker::Pending),
            ])
            .await
            .unwrap();

        let tools: Vec<Product> = store.query_by_index("category", "Tools").await.unwrap();
        assert_eq!(
            tools.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
            vec!["P-1", "P-3"]
        );

        let pending: Vec<Order> = store
            .query_by_index("syncStatus", "pending")
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        let for_customer: Vec<Order> = store.query_by_index("customerId", "C-1").await.unwrap();
        assert_eq!(for_customer.len(), 2);

        let by_date: Vec<Order> = store.query_by_index("date", "2026-01-15").await.unwrap();
        assert_eq!(by_date.len(), 3);
    }

    #[tokio::test]
    async fn unknown_index_is_rejected() {
        let store = open_store().await;
        let err = store
            .query_by_index::<Product>("email", "x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnknownIndex {
                collection: "products",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn clear_only_touches_one_collection() {
        let store = open_store().await;
        store.put(&product("P-1", "SKU-1", "Tools")).await.unwrap();
        store
            .put(&customer("C-1", "a@b.co", CustomerStatus::Active))
            .await
            .unwrap();

        store.clear(Collection::Products).await.unwrap();
        assert_eq!(store.count(Collection::Products).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Customers).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn records_survive_reopening_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let c = customer("C-9", "nine@acme.com", CustomerStatus::Active);

        let store = LocalStore::on_disk(Some(dir.path().to_path_buf()));
        store.open_or_create("durable", 1).await.unwrap();
        store.put(&c).await.unwrap();
        store.close().await;
        assert!(matches!(
            store.get_all::<Customer>().await,
            Err(StoreError::NotInitialized)
        ));

        let reopened = LocalStore::on_disk(Some(dir.path().to_path_buf()));
        reopened.open_or_create("durable", 1).await.unwrap();
        let found: Option<Customer> = reopened.get_by_id(&c.id).await.unwrap();
        assert_eq!(found, Some(c));
        assert!(dir.path().join("durable.db").exists());
    }

    #[test]
    fn collections_declare_their_indexes() {
        assert_eq!(
            Collection::Orders.indexes(),
            vec!["customerId", "date", "syncStatus"]
        );
        assert_eq!(Collection::Customers.indexes(), vec!["email", "status"]);
        assert_eq!(Collection::Products.indexes(), vec!["sku", "category"]);
        assert_eq!(Collection::SyncQueue.indexes(), vec!["status", "enqueuedAt"]);
    }
}

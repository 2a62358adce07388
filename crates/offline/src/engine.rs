//! Synchronization engine.
//!
//! A pass drains the outbound queue in FIFO order and then refreshes the
//! cached collections from the ERP. Passes are single-flight: a second call
//! while one is running returns immediately, and nothing runs while offline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use salesdesk_core::{DomainError, Entity, RecordId, SyncMarker, local_reference};
use salesdesk_parties::{Customer, CustomerDraft, CustomerStatus};
use salesdesk_products::{Product, ProductDraft};
use salesdesk_sales::{Order, OrderDraft, OrderStatus};

use crate::config::OfflineConfig;
use crate::queue::{self, OutboundQueue, QueueError};
use crate::reachability::{ListenerId, ReachabilityMonitor};
use crate::remote::{RemoteError, RemoteService};
use crate::status::{StatusBroadcaster, Subscription};
use crate::store::{self, CachedRecord, LocalStore, StoreError};
use crate::types::{
    EntityType, Mutation, QueueAction, QueueItem, QueueItemId, QueuePayload, QueueStatus,
    SyncPhase, SyncStatus, SyncableRecord,
};

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("offline mode is disabled")]
    OfflineModeDisabled,
    #[error("record {0} not found in the local store")]
    RecordNotFound(RecordId),
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Store(StoreError::StorageIo(err))
    }
}

/// Why `sync_all` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    AlreadySyncing,
}

/// Counters of one completed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub delivered: usize,
    /// Delivery attempts that failed in this pass.
    pub failed: usize,
    /// Items parked as terminally failed in this pass.
    pub terminally_failed: usize,
    pub refreshed_orders: usize,
    pub refreshed_customers: usize,
    pub refreshed_products: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Completed(SyncReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }
}

/// Input that becomes a new record when captured offline.
pub trait OfflineDraft: Send {
    type Record: SyncableRecord;

    fn materialize(self, id: RecordId, now: DateTime<Utc>) -> Result<Self::Record, DomainError>;
}

impl OfflineDraft for OrderDraft {
    type Record = Order;

    fn materialize(self, id: RecordId, now: DateTime<Utc>) -> Result<Order, DomainError> {
        self.into_order(
            id,
            local_reference(now),
            OrderStatus::Submitted,
            SyncMarker::Pending,
            now,
        )
    }
}

impl OfflineDraft for CustomerDraft {
    type Record = Customer;

    fn materialize(self, id: RecordId, now: DateTime<Utc>) -> Result<Customer, DomainError> {
        self.into_customer(id, CustomerStatus::Prospect, SyncMarker::Pending, now)
    }
}

impl OfflineDraft for ProductDraft {
    type Record = Product;

    fn materialize(self, id: RecordId, now: DateTime<Utc>) -> Result<Product, DomainError> {
        self.into_product(id, SyncMarker::Pending, now)
    }
}

/// What the ERP answered for a delivered item.
enum Delivered {
    Order(Order),
    Customer(Customer),
    Product(Product),
    Removed,
}

/// Holds the `syncing` flag for the duration of a pass.
struct SyncingGuard<'a> {
    engine: &'a SyncEngine,
}

impl<'a> SyncingGuard<'a> {
    fn acquire(engine: &'a SyncEngine) -> Option<Self> {
        engine
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { engine })
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.engine.set_phase(SyncPhase::Idle);
        self.engine.syncing.store(false, Ordering::Release);
    }
}

pub struct SyncEngine {
    store: LocalStore,
    queue: OutboundQueue,
    reachability: Arc<ReachabilityMonitor>,
    remote: Arc<dyn RemoteService>,
    status: StatusBroadcaster,
    config: OfflineConfig,
    syncing: AtomicBool,
    phase: Mutex<SyncPhase>,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    connectivity_listeners: [ListenerId; 2],
}

impl core::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("online", &self.reachability.is_online())
            .field("syncing", &self.is_syncing())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(
        store: LocalStore,
        reachability: Arc<ReachabilityMonitor>,
        remote: Arc<dyn RemoteService>,
        status: StatusBroadcaster,
        config: OfflineConfig,
    ) -> Self {
        let queue = OutboundQueue::new(store.clone(), config.max_retry_attempts);
        // Connectivity edges reach subscribers whether or not a worker runs.
        let connectivity_listeners = [
            reachability.on_transition_to_online(publish_connectivity(&status, true)),
            reachability.on_transition_to_offline(publish_connectivity(&status, false)),
        ];
        Self {
            store,
            queue,
            reachability,
            remote,
            status,
            config,
            syncing: AtomicBool::new(false),
            phase: Mutex::new(SyncPhase::Idle),
            last_sync: Mutex::new(None),
            connectivity_listeners,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn reachability(&self) -> &Arc<ReachabilityMonitor> {
        &self.reachability
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.status
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    pub fn is_online(&self) -> bool {
        self.reachability.is_online()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SyncPhase {
        *lock(&self.phase)
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_sync)
    }

    fn set_phase(&self, phase: SyncPhase) {
        *lock(&self.phase) = phase;
    }

    /// Compute the current status from the queue and the engine flags.
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let counts = self.queue.counts().await?;
        Ok(SyncStatus {
            is_online: self.is_online(),
            is_syncing: self.is_syncing(),
            phase: self.phase(),
            pending_count: counts.pending,
            in_flight_count: counts.in_flight,
            failed_count: counts.failed,
            last_sync_time: self.last_sync_time(),
        })
    }

    /// Recompute the status and deliver it to every subscriber.
    pub async fn broadcast(&self) {
        let status = match self.status().await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(error = %err, "queue counts unavailable, broadcasting last known counts");
                SyncStatus {
                    is_online: self.is_online(),
                    is_syncing: self.is_syncing(),
                    phase: self.phase(),
                    last_sync_time: self.last_sync_time(),
                    ..self.status.current()
                }
            }
        };
        self.status.publish(status);
    }

    /// Subscribe to status changes; `listener` first receives the status as
    /// it is now.
    pub async fn subscribe(
        &self,
        listener: impl Fn(&SyncStatus) + Send + Sync + 'static,
    ) -> Subscription {
        match self.status().await {
            Ok(status) => self.status.set_current(status),
            Err(err) => tracing::warn!(error = %err, "subscribing with last known status"),
        }
        self.status.subscribe(listener)
    }

    /// Run one drain-then-refresh pass.
    ///
    /// Returns `Skipped` without touching anything when offline or when a
    /// pass is already running. Per-item delivery failures and refresh
    /// failures are recorded, not returned; only local store failures abort
    /// the pass.
    pub async fn sync_all(&self) -> SyncResult<SyncOutcome> {
        if !self.is_online() {
            tracing::debug!("sync skipped: offline");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }
        let Some(guard) = SyncingGuard::acquire(self) else {
            tracing::debug!("sync skipped: a pass is already running");
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadySyncing));
        };

        let started = Instant::now();
        tracing::info!("sync pass started");
        self.set_phase(SyncPhase::Draining);
        self.broadcast().await;

        let result = self.run_pass().await;
        drop(guard);
        self.broadcast().await;

        match &result {
            Ok(report) => tracing::info!(
                delivered = report.delivered,
                failed = report.failed,
                terminally_failed = report.terminally_failed,
                refreshed_orders = report.refreshed_orders,
                refreshed_customers = report.refreshed_customers,
                refreshed_products = report.refreshed_products,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "sync pass finished"
            ),
            Err(err) => tracing::error!(error = %err, "sync pass aborted"),
        }
        result.map(SyncOutcome::Completed)
    }

    async fn run_pass(&self) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();

        self.drain(&mut report).await?;

        self.set_phase(SyncPhase::Refreshing);
        self.broadcast().await;
        self.refresh(&mut report).await;

        *lock(&self.last_sync) = Some(Utc::now());
        Ok(report)
    }

    async fn drain(&self, report: &mut SyncReport) -> SyncResult<()> {
        let snapshot = self.queue.list_pending().await?;
        let max_attempts = self.queue.max_retry_attempts();
        tracing::debug!(count = snapshot.len(), "draining outbound queue");

        for queued in snapshot {
            // Earlier deliveries may have rewritten or removed this item.
            let item = match self.queue.get(queued.id).await {
                Ok(item) if item.status == QueueStatus::Pending => item,
                Ok(_) | Err(QueueError::QueueItemNotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            };

            if item.retry_count >= max_attempts {
                self.queue.mark_terminal(item.id).await?;
                report.terminally_failed += 1;
                self.broadcast().await;
                continue;
            }

            self.queue.mark_in_flight(item.id).await?;
            tracing::debug!(
                item_id = %item.id,
                entity = %item.entity_type(),
                action = %item.action(),
                retry_count = item.retry_count,
                "dispatching queue item"
            );

            match self.dispatch(&item.payload).await {
                Ok(delivered) => {
                    if let Err(err) = self.reconcile(&item, delivered).await {
                        self.release_unreconciled(item.id, &err).await;
                        return Err(err);
                    }
                    report.delivered += 1;
                }
                Err(err) => {
                    let updated = self.queue.mark_failed(item.id, &err.to_string()).await?;
                    report.failed += 1;
                    if updated.status == QueueStatus::Failed {
                        report.terminally_failed += 1;
                    }
                }
            }
            self.broadcast().await;
        }
        Ok(())
    }

    async fn dispatch(&self, payload: &QueuePayload) -> Result<Delivered, RemoteError> {
        let remote = self.remote.as_ref();
        Ok(match payload {
            QueuePayload::Order(Mutation::Create(order)) => {
                Delivered::Order(remote.create_order(order).await?)
            }
            QueuePayload::Order(Mutation::Update(order)) => {
                Delivered::Order(remote.update_order(order).await?)
            }
            QueuePayload::Order(Mutation::Delete { id }) => {
                Delivered::Order(remote.cancel_order(id).await?)
            }
            QueuePayload::Customer(Mutation::Create(customer)) => {
                Delivered::Customer(remote.create_customer(customer).await?)
            }
            QueuePayload::Customer(Mutation::Update(customer)) => {
                Delivered::Customer(remote.update_customer(customer).await?)
            }
            QueuePayload::Customer(Mutation::Delete { id }) => {
                remote.delete_customer(id).await?;
                Delivered::Removed
            }
            QueuePayload::Product(Mutation::Create(product)) => {
                Delivered::Product(remote.create_product(product).await?)
            }
            QueuePayload::Product(Mutation::Update(product)) => {
                Delivered::Product(remote.update_product(product).await?)
            }
            QueuePayload::Product(Mutation::Delete { id }) => {
                remote.delete_product(id).await?;
                Delivered::Removed
            }
        })
    }

    /// Apply the ERP's answer locally and complete the item, atomically.
    async fn reconcile(&self, item: &QueueItem, delivered: Delivered) -> SyncResult<()> {
        let sent_id = item.payload.record_id();
        let mut tx = self.store.begin().await?;

        match delivered {
            Delivered::Removed => {
                let collection = match item.entity_type() {
                    EntityType::Order => Order::COLLECTION,
                    EntityType::Customer => Customer::COLLECTION,
                    EntityType::Product => Product::COLLECTION,
                };
                store::delete_record(&mut tx, collection, sent_id.as_str()).await?;
            }
            Delivered::Order(order) => {
                // A cancelled order is kept only if it was not deleted locally.
                let keep = item.action() != QueueAction::Delete
                    || store::get_record::<Order>(&mut tx, sent_id).await?.is_some();
                if keep {
                    store_delivered(&mut tx, sent_id, order).await?;
                }
            }
            Delivered::Customer(customer) => store_delivered(&mut tx, sent_id, customer).await?,
            Delivered::Product(product) => store_delivered(&mut tx, sent_id, product).await?,
        }

        queue::complete_item(&mut tx, item.id).await?;
        tx.commit().await?;

        tracing::debug!(item_id = %item.id, record_id = %sent_id, "queue item delivered");
        Ok(())
    }

    /// Count a delivery whose local write failed as a failed attempt, so the
    /// item is not stranded in flight until the next restart.
    async fn release_unreconciled(&self, id: QueueItemId, err: &SyncError) {
        let reason = format!("delivered but not reconciled locally: {err}");
        if let Err(release_err) = self.queue.mark_failed(id, &reason).await {
            tracing::error!(item_id = %id, error = %release_err, "queue item left in flight");
        }
    }

    async fn refresh(&self, report: &mut SyncReport) {
        let page_size = self.config.refresh_page_size;

        match self.remote.list_orders(1, page_size).await {
            Ok(page) => match self.store_refreshed(page.items).await {
                Ok(n) => report.refreshed_orders = n,
                Err(err) => refresh_failed("orders", &err),
            },
            Err(err) => refresh_failed("orders", &err),
        }
        match self.remote.list_customers(1, page_size).await {
            Ok(page) => match self.store_refreshed(page.items).await {
                Ok(n) => report.refreshed_customers = n,
                Err(err) => refresh_failed("customers", &err),
            },
            Err(err) => refresh_failed("customers", &err),
        }
        match self.remote.list_products(1, page_size).await {
            Ok(page) => match self.store_refreshed(page.items).await {
                Ok(n) => report.refreshed_products = n,
                Err(err) => refresh_failed("products", &err),
            },
            Err(err) => refresh_failed("products", &err),
        }
    }

    /// Overwrite cached copies with the ERP's. Records with undelivered queue
    /// items stay marked pending.
    async fn store_refreshed<R: SyncableRecord>(&self, mut records: Vec<R>) -> SyncResult<usize> {
        let mut tx = self.store.begin().await?;
        let undelivered = queue::undelivered_record_ids(&mut tx, R::ENTITY).await?;
        for record in &mut records {
            let marker = if undelivered.contains(record.id().as_str()) {
                SyncMarker::Pending
            } else {
                SyncMarker::Synced
            };
            record.set_sync_marker(marker);
            store::put_record(&mut tx, &*record).await?;
        }
        tx.commit().await?;
        Ok(records.len())
    }

    fn ensure_enabled(&self) -> SyncResult<()> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(SyncError::OfflineModeDisabled)
        }
    }

    /// Create a record locally and queue its creation, in one transaction.
    ///
    /// The record gets a `local-` key, a local reference where it has one and
    /// the same derived amounts the ERP computes. Never talks to the network.
    pub async fn create_offline_record<D: OfflineDraft>(&self, draft: D) -> SyncResult<D::Record> {
        self.ensure_enabled()?;

        let now = Utc::now();
        let record = draft.materialize(RecordId::new_local(), now)?;

        let mut tx = self.store.begin().await?;
        store::put_record(&mut tx, &record).await?;
        let payload = D::Record::into_payload(Mutation::Create(record.clone()));
        let item = queue::insert_item(&mut tx, payload, now).await?;
        tx.commit().await?;

        tracing::info!(
            record_id = %record.id(),
            item_id = %item.id,
            entity = %item.entity_type(),
            "record created offline"
        );
        self.broadcast().await;
        Ok(record)
    }

    /// Save a changed record locally and queue the change.
    ///
    /// A record that still waits for its creation to be delivered has the
    /// queued create rewritten instead of getting a separate update.
    pub async fn update_offline_record<R: SyncableRecord>(&self, mut record: R) -> SyncResult<R> {
        self.ensure_enabled()?;

        record.normalize()?;
        record.set_sync_marker(SyncMarker::Pending);
        let id = record.id().clone();
        let now = Utc::now();

        let mut tx = self.store.begin().await?;
        if store::get_record::<R>(&mut tx, &id).await?.is_none() {
            return Err(SyncError::RecordNotFound(id));
        }
        store::put_record(&mut tx, &record).await?;

        let pending_create = queue::pending_for_record(&mut tx, R::ENTITY, &id)
            .await?
            .into_iter()
            .find(|item| item.action() == QueueAction::Create);
        let item_id = match pending_create {
            Some(create) => {
                let payload = R::into_payload(Mutation::Create(record.clone()));
                queue::replace_payload(&mut tx, create.id, &payload).await?;
                create.id
            }
            None => {
                let payload = R::into_payload(Mutation::Update(record.clone()));
                queue::insert_item(&mut tx, payload, now).await?.id
            }
        };
        tx.commit().await?;

        tracing::info!(record_id = %id, item_id = %item_id, entity = %R::ENTITY, "record updated offline");
        self.broadcast().await;
        Ok(record)
    }

    /// Remove a record locally and queue its removal.
    ///
    /// A record whose creation was never delivered just disappears together
    /// with its queued items. Removing an order cancels it in the ERP.
    pub async fn delete_offline_record<R: SyncableRecord>(&self, id: &RecordId) -> SyncResult<()> {
        self.ensure_enabled()?;

        let mut tx = self.store.begin().await?;
        let pending = queue::pending_for_record(&mut tx, R::ENTITY, id).await?;
        let never_delivered = pending
            .iter()
            .any(|item| item.action() == QueueAction::Create);

        if never_delivered {
            for item in &pending {
                queue::complete_item(&mut tx, item.id).await?;
            }
        } else {
            for item in pending.iter().filter(|i| i.action() == QueueAction::Update) {
                queue::complete_item(&mut tx, item.id).await?;
            }
            let payload = R::into_payload(Mutation::Delete { id: id.clone() });
            queue::insert_item(&mut tx, payload, Utc::now()).await?;
        }
        store::delete_record(&mut tx, R::COLLECTION, id.as_str()).await?;
        tx.commit().await?;

        tracing::info!(record_id = %id, entity = %R::ENTITY, never_delivered, "record deleted offline");
        self.broadcast().await;
        Ok(())
    }

    /// Cancel an order locally and queue the cancellation.
    pub async fn cancel_offline_order(&self, id: &RecordId) -> SyncResult<Order> {
        self.ensure_enabled()?;

        let mut tx = self.store.begin().await?;
        let mut order = store::get_record::<Order>(&mut tx, id)
            .await?
            .ok_or_else(|| SyncError::RecordNotFound(id.clone()))?;
        order.cancel()?;

        let pending = queue::pending_for_record(&mut tx, EntityType::Order, id).await?;
        let never_delivered = pending
            .iter()
            .any(|item| item.action() == QueueAction::Create);

        if never_delivered {
            // Nothing to cancel remotely.
            for item in &pending {
                queue::complete_item(&mut tx, item.id).await?;
            }
            order.sync_status = SyncMarker::Synced;
        } else {
            order.sync_status = SyncMarker::Pending;
            let payload = QueuePayload::Order(Mutation::Delete { id: id.clone() });
            queue::insert_item(&mut tx, payload, Utc::now()).await?;
        }
        store::put_record(&mut tx, &order).await?;
        tx.commit().await?;

        tracing::info!(record_id = %id, never_delivered, "order cancelled offline");
        self.broadcast().await;
        Ok(order)
    }

    /// Queue a mutation that has already been applied locally.
    pub async fn enqueue(&self, payload: QueuePayload) -> SyncResult<QueueItem> {
        self.ensure_enabled()?;
        let item = self.queue.enqueue(payload).await?;
        self.broadcast().await;
        Ok(item)
    }

    /// Give a terminally failed item a fresh retry budget.
    pub async fn retry_failed(&self, id: QueueItemId) -> SyncResult<QueueItem> {
        let item = self.queue.retry_failed(id).await?;
        self.broadcast().await;
        Ok(item)
    }

    /// Drop a queue item for good.
    pub async fn discard(&self, id: QueueItemId) -> SyncResult<()> {
        self.queue.discard(id).await?;
        self.broadcast().await;
        Ok(())
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        for id in self.connectivity_listeners {
            self.reachability.remove_listener(id);
        }
    }
}

/// Listener that republishes the last status with the new online flag.
///
/// Connectivity does not change queue counts, so no store read is needed.
fn publish_connectivity(status: &StatusBroadcaster, online: bool) -> impl Fn() + Send + Sync + 'static {
    let status = status.clone();
    move || status.update(|current| current.is_online = online)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn refresh_failed(collection: &'static str, err: &dyn std::fmt::Display) {
    tracing::warn!(collection, error = %err, "refresh failed");
}

/// Store the ERP's copy of a delivered record.
///
/// When the ERP assigned a new key the local-key copy is replaced and every
/// reference to it is rewritten. While later changes to the record are still
/// queued the local copy stays marked pending.
async fn store_delivered<R: SyncableRecord>(
    conn: &mut SqliteConnection,
    sent_id: &RecordId,
    mut record: R,
) -> SyncResult<()> {
    let final_id = record.id().clone();
    let rekeyed = &final_id != sent_id;

    if rekeyed {
        store::delete_record(conn, R::COLLECTION, sent_id.as_str()).await?;
        remap_references(conn, R::ENTITY, sent_id, &final_id).await?;
        tracing::info!(from = %sent_id, to = %final_id, entity = %R::ENTITY, "local record reconciled");
    }

    let still_pending = !queue::pending_for_record(conn, R::ENTITY, &final_id)
        .await?
        .is_empty();
    if still_pending && !rekeyed {
        return Ok(());
    }

    record.set_sync_marker(if still_pending {
        SyncMarker::Pending
    } else {
        SyncMarker::Synced
    });
    store::put_record(conn, &record).await?;
    Ok(())
}

/// Point queued payloads and cached orders at the remote key.
async fn remap_references(
    conn: &mut SqliteConnection,
    entity: EntityType,
    from: &RecordId,
    to: &RecordId,
) -> SyncResult<()> {
    for entity_type in [EntityType::Order, EntityType::Customer, EntityType::Product] {
        for item in queue::unfinished_of(conn, entity_type).await? {
            let mut payload = item.payload;
            if payload.remap_id(entity, from, to) {
                queue::replace_payload(conn, item.id, &payload).await?;
            }
        }
    }

    let affected: Vec<Order> = match entity {
        EntityType::Customer => store::query_records(conn, "customerId", from.as_str()).await?,
        EntityType::Product => store::all_records::<Order>(conn)
            .await?
            .into_iter()
            .filter(|o| o.lines.iter().any(|l| &l.product_id == from))
            .collect(),
        EntityType::Order => Vec::new(),
    };
    for mut order in affected {
        if order.customer_id == *from {
            order.customer_id = to.clone();
        }
        for line in &mut order.lines {
            if line.product_id == *from {
                line.product_id = to.clone();
            }
        }
        store::put_record(conn, &order).await?;
    }
    Ok(())
}

//! Shared types of the offline core.
//!
//! Queue items, their typed payloads and the sync status snapshot live here so
//! the store, the queue, the engine and the broadcaster agree on one shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, Entity, RecordId, SyncMarker};
use salesdesk_parties::Customer;
use salesdesk_products::Product;
use salesdesk_sales::Order;

use crate::store::CachedRecord;

/// Kind of remote entity a queue item targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Order,
    Customer,
    Product,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Order => "order",
            EntityType::Customer => "customer",
            EntityType::Product => "product",
        }
    }
}

impl core::fmt::Display for EntityType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation kind of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueAction {
    Create,
    Update,
    Delete,
}

impl QueueAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueAction::Create => "create",
            QueueAction::Update => "update",
            QueueAction::Delete => "delete",
        }
    }
}

impl core::fmt::Display for QueueAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery status of a queue item.
///
/// `Completed` is never persisted: a delivered item is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    InFlight,
    Failed,
    Completed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::InFlight => "in_flight",
            QueueStatus::Failed => "failed",
            QueueStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueStatus::Pending),
            "in_flight" => Some(QueueStatus::InFlight),
            "failed" => Some(QueueStatus::Failed),
            "completed" => Some(QueueStatus::Completed),
            _ => None,
        }
    }
}

/// Autoincrement identifier of a queue item (local only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueItemId(pub i64);

impl core::fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A replayable change to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "lowercase")]
pub enum Mutation<T> {
    Create(T),
    Update(T),
    Delete { id: RecordId },
}

impl<T: CachedRecord> Mutation<T> {
    pub fn action(&self) -> QueueAction {
        match self {
            Mutation::Create(_) => QueueAction::Create,
            Mutation::Update(_) => QueueAction::Update,
            Mutation::Delete { .. } => QueueAction::Delete,
        }
    }

    pub fn record_id(&self) -> &RecordId {
        match self {
            Mutation::Create(record) | Mutation::Update(record) => Entity::id(record),
            Mutation::Delete { id } => id,
        }
    }
}

/// Typed payload of a queue item, keyed by entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "mutation", rename_all = "lowercase")]
pub enum QueuePayload {
    Order(Mutation<Order>),
    Customer(Mutation<Customer>),
    Product(Mutation<Product>),
}

impl QueuePayload {
    pub fn entity_type(&self) -> EntityType {
        match self {
            QueuePayload::Order(_) => EntityType::Order,
            QueuePayload::Customer(_) => EntityType::Customer,
            QueuePayload::Product(_) => EntityType::Product,
        }
    }

    pub fn action(&self) -> QueueAction {
        match self {
            QueuePayload::Order(m) => m.action(),
            QueuePayload::Customer(m) => m.action(),
            QueuePayload::Product(m) => m.action(),
        }
    }

    /// Key of the record this mutation replays.
    pub fn record_id(&self) -> &RecordId {
        match self {
            QueuePayload::Order(m) => m.record_id(),
            QueuePayload::Customer(m) => m.record_id(),
            QueuePayload::Product(m) => m.record_id(),
        }
    }

    /// Rewrite every reference to the `entity` record `from` so it points at
    /// `to`. Returns whether anything changed.
    pub(crate) fn remap_id(&mut self, entity: EntityType, from: &RecordId, to: &RecordId) -> bool {
        let own = self.entity_type();
        let mut changed = false;
        match self {
            QueuePayload::Order(Mutation::Create(order) | Mutation::Update(order)) => match entity {
                EntityType::Order => changed |= swap_id(&mut order.id, from, to),
                EntityType::Customer => changed |= swap_id(&mut order.customer_id, from, to),
                EntityType::Product => {
                    for line in &mut order.lines {
                        changed |= swap_id(&mut line.product_id, from, to);
                    }
                }
            },
            QueuePayload::Customer(Mutation::Create(customer) | Mutation::Update(customer)) => {
                if entity == EntityType::Customer {
                    changed |= swap_id(&mut customer.id, from, to);
                }
            }
            QueuePayload::Product(Mutation::Create(product) | Mutation::Update(product)) => {
                if entity == EntityType::Product {
                    changed |= swap_id(&mut product.id, from, to);
                }
            }
            QueuePayload::Order(Mutation::Delete { id })
            | QueuePayload::Customer(Mutation::Delete { id })
            | QueuePayload::Product(Mutation::Delete { id }) => {
                if entity == own {
                    changed |= swap_id(id, from, to);
                }
            }
        }
        changed
    }
}

fn swap_id(id: &mut RecordId, from: &RecordId, to: &RecordId) -> bool {
    if id == from {
        *id = to.clone();
        true
    } else {
        false
    }
}

/// One pending mutation in the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: QueueItemId,
    pub payload: QueuePayload,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub status: QueueStatus,
    pub last_error: Option<String>,
}

impl QueueItem {
    pub fn entity_type(&self) -> EntityType {
        self.payload.entity_type()
    }

    pub fn action(&self) -> QueueAction {
        self.payload.action()
    }
}

/// Queue population by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub in_flight: u64,
    pub failed: u64,
}

/// Records that can be created, changed or removed while offline.
pub trait SyncableRecord: CachedRecord + Clone {
    const ENTITY: EntityType;

    /// Wrap a mutation of this record type into a queue payload.
    fn into_payload(mutation: Mutation<Self>) -> QueuePayload;

    fn set_sync_marker(&mut self, marker: SyncMarker);

    /// Recompute derived fields before an offline write.
    fn normalize(&mut self) -> Result<(), DomainError> {
        Ok(())
    }
}

impl SyncableRecord for Order {
    const ENTITY: EntityType = EntityType::Order;

    fn into_payload(mutation: Mutation<Self>) -> QueuePayload {
        QueuePayload::Order(mutation)
    }

    fn set_sync_marker(&mut self, marker: SyncMarker) {
        self.sync_status = marker;
    }

    fn normalize(&mut self) -> Result<(), DomainError> {
        self.recompute_totals()
    }
}

impl SyncableRecord for Customer {
    const ENTITY: EntityType = EntityType::Customer;

    fn into_payload(mutation: Mutation<Self>) -> QueuePayload {
        QueuePayload::Customer(mutation)
    }

    fn set_sync_marker(&mut self, marker: SyncMarker) {
        self.sync_status = marker;
    }
}

impl SyncableRecord for Product {
    const ENTITY: EntityType = EntityType::Product;

    fn into_payload(mutation: Mutation<Self>) -> QueuePayload {
        QueuePayload::Product(mutation)
    }

    fn set_sync_marker(&mut self, marker: SyncMarker) {
        self.sync_status = marker;
    }
}

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Online and able to reach the ERP.
    Online,
    /// Offline (network unreachable or ERP unavailable).
    Offline,
}

impl From<bool> for ConnectivityState {
    fn from(online: bool) -> Self {
        if online {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }
}

/// Where the sync engine currently is in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    Draining,
    Refreshing,
}

/// Computed sync snapshot handed to observers. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub phase: SyncPhase,
    /// Retryable backlog (`status = pending`).
    pub pending_count: u64,
    pub in_flight_count: u64,
    /// Items that exhausted their retry budget and need an operator.
    pub failed_count: u64,
    pub last_sync_time: Option<DateTime<Utc>>,
}

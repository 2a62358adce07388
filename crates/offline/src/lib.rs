//! `salesdesk-offline`
//!
//! **Responsibility:** Offline synchronization core of the salesdesk client.
//!
//! This crate provides:
//! - A durable local store (SQLite) with the `orders`, `customers`, `products`
//!   and `syncQueue` collections
//! - An outbound queue of mutations made while offline
//! - A network reachability monitor
//! - A single-flight sync engine (drain the queue, then refresh the cache)
//! - A status broadcaster for UI indicators
//!
//! The ERP stays the authority; the queue is authoritative for writes it has
//! not received yet.

pub mod app;
pub mod config;
pub mod engine;
pub mod queue;
pub mod reachability;
pub mod remote;
pub mod status;
pub mod store;
pub mod types;
pub mod worker;

pub use app::{OfflineApp, RunningApp};
pub use config::{ConfigError, OfflineConfig};
pub use engine::{
    OfflineDraft, SkipReason, SyncEngine, SyncError, SyncOutcome, SyncReport, SyncResult,
};
pub use queue::{OutboundQueue, QueueError};
pub use reachability::{ConnectivityProbe, ListenerId, ReachabilityMonitor, StaticProbe};
pub use remote::{MockErp, Page, RemoteCall, RemoteError, RemoteService};
pub use status::{StatusBroadcaster, Subscription};
pub use store::{CachedRecord, Collection, LocalStore, StoreError};
pub use types::{
    ConnectivityState, EntityType, Mutation, QueueAction, QueueCounts, QueueItem, QueueItemId,
    QueuePayload, QueueStatus, SyncPhase, SyncStatus, SyncableRecord,
};
pub use worker::{SyncWorker, WorkerHandle};

#[cfg(feature = "http")]
pub use remote::http::{HttpHealthProbe, HttpRemoteService};

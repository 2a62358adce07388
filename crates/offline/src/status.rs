//! Sync status broadcaster.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::types::SyncStatus;

type Listener = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
    last: SyncStatus,
}

/// Pub/sub hub for [`SyncStatus`] snapshots.
///
/// Listeners are called synchronously in registration order, outside the
/// internal lock, so a listener may subscribe or unsubscribe others.
#[derive(Clone, Default)]
pub struct StatusBroadcaster {
    inner: Arc<Mutex<Inner>>,
}

impl core::fmt::Debug for StatusBroadcaster {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StatusBroadcaster")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` and deliver the current status to it immediately.
    pub fn subscribe(&self, listener: impl Fn(&SyncStatus) + Send + Sync + 'static) -> Subscription {
        let listener: Listener = Arc::new(listener);
        let (id, current) = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.listeners.insert(id, listener.clone());
            (id, inner.last.clone())
        };
        listener(&current);

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Store `status` as current and deliver it to every subscriber.
    pub fn publish(&self, status: SyncStatus) {
        let listeners: Vec<Listener> = {
            let mut inner = self.lock();
            inner.last = status.clone();
            inner.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(&status);
        }
    }

    /// Change the current status in place and deliver the result.
    pub fn update(&self, change: impl FnOnce(&mut SyncStatus)) {
        let (status, listeners) = {
            let mut inner = self.lock();
            change(&mut inner.last);
            let listeners: Vec<Listener> = inner.listeners.values().cloned().collect();
            (inner.last.clone(), listeners)
        };
        for listener in listeners {
            listener(&status);
        }
    }

    /// Replace the current status without notifying anyone.
    pub fn set_current(&self, status: SyncStatus) {
        self.lock().last = status;
    }

    /// Last published status.
    pub fn current(&self) -> SyncStatus {
        self.lock().last.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

/// Live registration; unsubscribes on [`Subscription::unsubscribe`] or drop.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    inner: Weak<Mutex<Inner>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    /// Keep the listener registered for the broadcaster's lifetime.
    pub fn detach(mut self) {
        self.inner = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .remove(&self.id);
        }
    }
}

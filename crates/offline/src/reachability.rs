//! Network reachability monitor.
//!
//! Holds the current online flag, publishes it on a `watch` channel and calls
//! transition listeners exactly once per edge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::types::ConnectivityState;

/// Host connectivity indicator.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// Probe whose answer is set by hand.
#[derive(Debug, Default)]
pub struct StaticProbe {
    online: AtomicBool,
}

impl StaticProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_reachable(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Handle returned when registering a transition listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    to_online: Vec<(ListenerId, Listener)>,
    to_offline: Vec<(ListenerId, Listener)>,
}

pub struct ReachabilityMonitor {
    tx: watch::Sender<bool>,
    listeners: Mutex<Listeners>,
}

impl core::fmt::Debug for ReachabilityMonitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReachabilityMonitor")
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl ReachabilityMonitor {
    pub fn new(initial: bool) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx,
            listeners: Mutex::new(Listeners::default()),
        }
    }

    /// Monitor seeded from the probe's current answer.
    pub async fn from_probe(probe: &dyn ConnectivityProbe) -> Self {
        let online = probe.is_reachable().await;
        tracing::info!(online, "initial connectivity");
        Self::new(online)
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn state(&self) -> ConnectivityState {
        ConnectivityState::from(self.is_online())
    }

    /// Receiver that observes every change of the flag.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Feed a connectivity reading. Returns `true` when it was an edge.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            tracing::info!(state = ?ConnectivityState::from(online), "connectivity changed");
            // Listeners run outside the lock so they may register or remove others.
            let listeners: Vec<Listener> = {
                let guard = self.lock();
                let side = if online {
                    &guard.to_online
                } else {
                    &guard.to_offline
                };
                side.iter().map(|(_, l)| l.clone()).collect()
            };
            for listener in listeners {
                listener();
            }
        }
        changed
    }

    pub fn on_transition_to_online(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
        let mut guard = self.lock();
        let id = next_id(&mut guard);
        guard.to_online.push((id, Arc::new(listener)));
        id
    }

    pub fn on_transition_to_offline(
        &self,
        listener: impl Fn() + Send + Sync + 'static,
    ) -> ListenerId {
        let mut guard = self.lock();
        let id = next_id(&mut guard);
        guard.to_offline.push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut guard = self.lock();
        let before = guard.to_online.len() + guard.to_offline.len();
        guard.to_online.retain(|(lid, _)| *lid != id);
        guard.to_offline.retain(|(lid, _)| *lid != id);
        before != guard.to_online.len() + guard.to_offline.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn next_id(listeners: &mut Listeners) -> ListenerId {
    listeners.next_id += 1;
    ListenerId(listeners.next_id)
}

/// Poll `probe` every `interval` and feed the monitor until `shutdown` fires.
pub fn spawn_probe_loop(
    monitor: Arc<ReachabilityMonitor>,
    probe: Arc<dyn ConnectivityProbe>,
    interval: Duration,
    shutdown: Arc<Notify>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::debug!("probe loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let online = probe.is_reachable().await;
                    monitor.set_online(online);
                }
            }
        }
    })
}

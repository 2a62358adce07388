//! Background worker that keeps the local store in sync.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::{SyncEngine, SyncOutcome};

/// Runs `sync_all` on a timer and whenever connectivity comes back.
pub struct SyncWorker {
    engine: Arc<SyncEngine>,
    shutdown: Arc<Notify>,
}

/// Handle to a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the worker and wait for it to stop.
    ///
    /// A pass that is already running finishes first.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.join.await {
            tracing::error!(error = %err, "sync worker task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl SyncWorker {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Start the background sync worker.
    ///
    /// The spawned task calls `sync_all` every `sync_interval` (the first
    /// tick is immediate) and right away on a transition to online, until
    /// [`WorkerHandle::shutdown`]. The engine broadcasts connectivity edges
    /// itself.
    pub fn start(self) -> WorkerHandle {
        let shutdown = self.shutdown.clone();
        let engine = self.engine;
        let mut connectivity = engine.reachability().watch();

        let join = tokio::spawn(async move {
            let period = engine.config().sync_interval;
            tracing::info!(interval_ms = period.as_millis() as u64, "sync worker started");

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut watching = true;

            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        tracing::info!("sync worker received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        run_pass(&engine, "timer").await;
                    }
                    changed = connectivity.changed(), if watching => {
                        if changed.is_err() {
                            // Monitor dropped; the timer keeps running.
                            watching = false;
                            continue;
                        }
                        let online = *connectivity.borrow_and_update();
                        if online {
                            run_pass(&engine, "reconnect").await;
                        }
                    }
                }
            }

            tracing::info!("sync worker stopped");
        });

        WorkerHandle {
            shutdown: self.shutdown,
            join,
        }
    }
}

async fn run_pass(engine: &SyncEngine, trigger: &'static str) {
    match engine.sync_all().await {
        Ok(SyncOutcome::Completed(report)) => {
            tracing::debug!(trigger, delivered = report.delivered, "triggered sync completed");
        }
        Ok(SyncOutcome::Skipped(reason)) => {
            tracing::debug!(trigger, ?reason, "triggered sync skipped");
        }
        Err(err) => {
            tracing::warn!(trigger, error = %err, "triggered sync failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use salesdesk_core::{RecordId, SyncMarker};
    use salesdesk_parties::CustomerDraft;

    use crate::config::OfflineConfig;
    use crate::reachability::ReachabilityMonitor;
    use crate::remote::{MockErp, RemoteCall};
    use crate::status::StatusBroadcaster;
    use crate::store::LocalStore;

    async fn engine(online: bool, erp: Arc<MockErp>, interval: Duration) -> Arc<SyncEngine> {
        let store = LocalStore::in_memory();
        store.open_or_create("worker-test", 1).await.unwrap();
        Arc::new(SyncEngine::new(
            store,
            Arc::new(ReachabilityMonitor::new(online)),
            erp,
            StatusBroadcaster::new(),
            OfflineConfig::default().with_sync_interval(interval),
        ))
    }

    fn draft() -> CustomerDraft {
        CustomerDraft {
            name: "Northwind".to_string(),
            email: "ops@northwind.test".to_string(),
            phone: None,
            address: None,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn reconnecting_triggers_a_sync() {
        let erp = Arc::new(MockErp::new());
        let engine = engine(false, erp.clone(), Duration::from_secs(3600)).await;
        let created = engine.create_offline_record(draft()).await.unwrap();

        let handle = SyncWorker::new(engine.clone()).start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(erp.calls().is_empty());

        engine.reachability().set_online(true);
        wait_until(|| !erp.mutation_calls().is_empty()).await;
        assert_eq!(erp.mutation_calls(), vec![RemoteCall::CreateCustomer(created.id.clone())]);

        handle.shutdown().await;
        let stored = engine.store().get_all::<salesdesk_parties::Customer>().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, RecordId::remote("CUS-000001"));
        assert_eq!(stored[0].sync_status, SyncMarker::Synced);
    }

    #[tokio::test]
    async fn timer_syncs_while_online_and_shutdown_stops_it() {
        let erp = Arc::new(MockErp::new());
        let engine = engine(true, erp.clone(), Duration::from_millis(20)).await;

        let handle = SyncWorker::new(engine.clone()).start();
        wait_until(|| erp.calls().len() >= 6).await;
        handle.shutdown().await;

        let after_stop = erp.calls().len();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(erp.calls().len(), after_stop);
        assert!(engine.last_sync_time().is_some());
    }
}

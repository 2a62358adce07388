//! Composition root: builds and wires the offline services.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::OfflineConfig;
use crate::engine::SyncEngine;
use crate::reachability::{ConnectivityProbe, ReachabilityMonitor, spawn_probe_loop};
use crate::remote::RemoteService;
use crate::status::StatusBroadcaster;
use crate::store::LocalStore;
use crate::worker::{SyncWorker, WorkerHandle};

/// The wired offline services of one client.
pub struct OfflineApp {
    config: OfflineConfig,
    store: LocalStore,
    reachability: Arc<ReachabilityMonitor>,
    probe: Arc<dyn ConnectivityProbe>,
    engine: Arc<SyncEngine>,
}

/// Background tasks started by [`OfflineApp::start`].
#[derive(Debug)]
pub struct RunningApp {
    worker: Option<WorkerHandle>,
    probe_shutdown: Arc<Notify>,
    probe_loop: JoinHandle<()>,
}

impl RunningApp {
    /// Stop the sync worker and the probe loop.
    pub async fn shutdown(self) {
        if let Some(worker) = self.worker {
            worker.shutdown().await;
        }
        self.probe_shutdown.notify_one();
        if let Err(err) = self.probe_loop.await {
            tracing::error!(error = %err, "probe loop task failed");
        }
    }
}

impl OfflineApp {
    /// Open the on-disk store named by `config` and wire the services.
    ///
    /// Store failures propagate: nothing offline works without persistence.
    pub async fn bootstrap(
        config: OfflineConfig,
        remote: Arc<dyn RemoteService>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> anyhow::Result<Self> {
        let store = LocalStore::on_disk(config.db_dir.clone());
        Self::bootstrap_with_store(config, store, remote, probe).await
    }

    /// Like [`OfflineApp::bootstrap`] with a caller-provided (unopened) store.
    pub async fn bootstrap_with_store(
        config: OfflineConfig,
        store: LocalStore,
        remote: Arc<dyn RemoteService>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> anyhow::Result<Self> {
        store
            .open_or_create(&config.db_name, config.db_version)
            .await
            .with_context(|| {
                format!(
                    "failed to open local store '{}' (schema version {})",
                    config.db_name, config.db_version
                )
            })?;

        let reachability = Arc::new(ReachabilityMonitor::from_probe(probe.as_ref()).await);
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            reachability.clone(),
            remote,
            StatusBroadcaster::new(),
            config.clone(),
        ));

        engine
            .queue()
            .recover_in_flight()
            .await
            .context("failed to recover interrupted queue items")?;
        engine.broadcast().await;

        tracing::info!(
            db_name = %config.db_name,
            db_version = config.db_version,
            offline_enabled = config.enabled,
            online = reachability.is_online(),
            "offline services ready"
        );

        Ok(Self {
            config,
            store,
            reachability,
            probe,
            engine,
        })
    }

    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn reachability(&self) -> &Arc<ReachabilityMonitor> {
        &self.reachability
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Launch the probe loop and, when offline mode is enabled, the sync worker.
    pub fn start(&self) -> RunningApp {
        let probe_shutdown = Arc::new(Notify::new());
        let probe_loop = spawn_probe_loop(
            self.reachability.clone(),
            self.probe.clone(),
            self.config.probe_interval,
            probe_shutdown.clone(),
        );

        let worker = if self.config.enabled {
            Some(SyncWorker::new(self.engine.clone()).start())
        } else {
            tracing::info!("offline mode disabled, sync worker not started");
            None
        };

        RunningApp {
            worker,
            probe_shutdown,
            probe_loop,
        }
    }

    /// Close the local store.
    pub async fn close(self) {
        self.store.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::reachability::StaticProbe;
    use crate::remote::MockErp;
    use crate::types::{Mutation, QueuePayload, QueueStatus};
    use salesdesk_core::RecordId;

    #[tokio::test]
    async fn bootstrap_recovers_interrupted_items() {
        let dir = tempfile::tempdir().unwrap();
        let config = OfflineConfig::default()
            .with_db_dir(dir.path())
            .with_database("bootstrap-test", 1);

        let store = LocalStore::on_disk(config.db_dir.clone());
        store
            .open_or_create(&config.db_name, config.db_version)
            .await
            .unwrap();
        let queue = crate::queue::OutboundQueue::new(store.clone(), 3);
        let item = queue
            .enqueue(QueuePayload::Product(Mutation::Delete {
                id: RecordId::remote("PRD-1"),
            }))
            .await
            .unwrap();
        queue.mark_in_flight(item.id).await.unwrap();
        store.close().await;

        let app = OfflineApp::bootstrap(
            config,
            Arc::new(MockErp::new()),
            Arc::new(StaticProbe::new(false)),
        )
        .await
        .unwrap();

        let recovered = app.engine().queue().get(item.id).await.unwrap();
        assert_eq!(recovered.status, QueueStatus::Pending);
        assert!(!app.reachability().is_online());
        assert_eq!(app.engine().broadcaster().current().pending_count, 1);
        app.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_when_the_store_cannot_open() {
        let config = OfflineConfig::default().with_database("bad/name", 1);
        let err = OfflineApp::bootstrap_with_store(
            config,
            LocalStore::in_memory(),
            Arc::new(MockErp::new()),
            Arc::new(StaticProbe::new(true)),
        )
        .await
        .err()
        .expect("bootstrap should fail");

        assert!(err.to_string().contains("failed to open local store"));
    }

    #[tokio::test]
    async fn started_app_shuts_down_cleanly() {
        let config = OfflineConfig::default().with_enabled(false);
        let app = OfflineApp::bootstrap_with_store(
            config,
            LocalStore::in_memory(),
            Arc::new(MockErp::new()),
            Arc::new(StaticProbe::new(true)),
        )
        .await
        .unwrap();

        let running = app.start();
        running.shutdown().await;
        assert!(app.reachability().is_online());
    }

    #[tokio::test]
    async fn health_readings_reach_subscribers_without_the_worker() {
        let health = Arc::new(StaticProbe::new(false));
        let config = OfflineConfig::default()
            .with_enabled(false)
            .with_probe_interval(Duration::from_millis(10));
        let app = OfflineApp::bootstrap_with_store(
            config,
            LocalStore::in_memory(),
            Arc::new(MockErp::new()),
            health.clone(),
        )
        .await
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = app
            .engine()
            .subscribe(move |status| sink.lock().unwrap().push(status.is_online))
            .await;
        let running = app.start();

        health.set(true);
        tokio::time::timeout(Duration::from_secs(5), async {
            while !seen.lock().unwrap().last().copied().unwrap_or(false) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("online reading never broadcast");

        health.set(false);
        tokio::time::timeout(Duration::from_secs(5), async {
            while seen.lock().unwrap().last().copied().unwrap_or(true) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("offline reading never broadcast");

        running.shutdown().await;
        assert!(!app.engine().broadcaster().current().is_online);
        assert_eq!(*seen.lock().unwrap(), vec![false, true, false]);
    }
}

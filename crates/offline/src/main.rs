//! Headless sync agent: keeps a local salesdesk store in sync with the ERP.

use std::sync::Arc;

use anyhow::Context;
use salesdesk_offline::{HttpHealthProbe, HttpRemoteService, OfflineApp, OfflineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    salesdesk_observability::init();

    let config = OfflineConfig::from_env().context("invalid offline configuration")?;

    // Get API URL from environment or use default
    let api_url =
        std::env::var("SALESDESK_API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

    let remote = if let Ok(token) = std::env::var("SALESDESK_API_TOKEN") {
        tracing::info!("using authenticated ERP client");
        HttpRemoteService::with_token(api_url.clone(), token)
    } else {
        tracing::info!("using unauthenticated ERP client");
        HttpRemoteService::new(api_url.clone())
    };
    let probe = HttpHealthProbe::new(api_url);

    let app = OfflineApp::bootstrap(config, Arc::new(remote), Arc::new(probe)).await?;

    let subscription = app.engine().subscribe(|status| {
        tracing::info!(
            online = status.is_online,
            syncing = status.is_syncing,
            pending = status.pending_count,
            failed = status.failed_count,
            "sync status"
        );
    })
    .await;

    let running = app.start();
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("shutting down");
    subscription.unsubscribe();
    running.shutdown().await;
    app.close().await;
    Ok(())
}

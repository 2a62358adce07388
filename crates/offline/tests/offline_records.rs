mod common;

use std::sync::Arc;

use common::{Harness, customer_draft, order_draft, remote_customer, remote_product};
use salesdesk_core::{RecordId, SyncMarker};
use salesdesk_offline::{
    Collection, LocalStore, MockErp, Mutation, OfflineApp, OfflineConfig, QueueAction,
    QueuePayload, QueueStatus, RemoteCall, StaticProbe, StoreError, SyncError,
};
use salesdesk_parties::{Customer, CustomerStatus};
use salesdesk_products::{Product, ProductDraft};
use salesdesk_sales::{Order, OrderStatus};

/// Harness whose store already holds the ERP's customers and products.
async fn synced_harness() -> Harness {
    let erp = MockErp::new();
    erp.seed_customers([remote_customer("CUS-000900", "known@acme.test")]);
    erp.seed_products([remote_product("PRD-000900", "SKU-900", "Tools")]);
    let h = Harness::with(true, OfflineConfig::default(), erp).await;
    h.engine.sync_all().await.unwrap();
    h.erp.clear_calls();
    h
}

#[tokio::test]
async fn order_for_a_new_customer_follows_the_customer_key() {
    let h = Harness::new(false).await;
    let customer = h
        .engine
        .create_offline_record(customer_draft("  Fresh Foods ", "Orders@Fresh.test"))
        .await
        .unwrap();
    assert_eq!(customer.name, "Fresh Foods");
    assert_eq!(customer.email, "orders@fresh.test");
    assert_eq!(customer.status, CustomerStatus::Prospect);

    let order = h
        .engine
        .create_offline_record(order_draft(&customer.id, &[(4, 199, 0)]))
        .await
        .unwrap();

    h.go_online();
    let report = *h.engine.sync_all().await.unwrap().report().unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 0);

    let customers: Vec<Customer> = h.store.get_all().await.unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].id.as_str(), "CUS-000001");

    let orders: Vec<Order> = h.store.get_all().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id.as_str(), "ORD-000001");
    assert_eq!(orders[0].customer_id.as_str(), "CUS-000001");
    assert_eq!(orders[0].status, OrderStatus::Confirmed);
    assert!(h.store.get_by_id::<Order>(&order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn editing_an_undelivered_record_rewrites_its_create() {
    let h = Harness::new(false).await;
    let mut customer = h
        .engine
        .create_offline_record(customer_draft("Acme", "buyer@acme.test"))
        .await
        .unwrap();

    customer.phone = Some("+1 555 0199".to_string());
    h.engine.update_offline_record(customer.clone()).await.unwrap();

    let items = h.engine.queue().list_all().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].action(), QueueAction::Create);
    match &items[0].payload {
        QueuePayload::Customer(Mutation::Create(queued)) => {
            assert_eq!(queued.phone.as_deref(), Some("+1 555 0199"));
        }
        other => panic!("unexpected payload {other:?}"),
    }
}

#[tokio::test]
async fn editing_a_synced_record_queues_an_update() {
    let h = synced_harness().await;
    let mut customer: Customer = h
        .store
        .get_by_id(&RecordId::remote("CUS-000900"))
        .await
        .unwrap()
        .unwrap();
    customer.status = CustomerStatus::Inactive;

    let saved = h.engine.update_offline_record(customer).await.unwrap();
    assert_eq!(saved.sync_status, SyncMarker::Pending);
    let pending = h.engine.queue().list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].action(), QueueAction::Update);

    h.engine.sync_all().await.unwrap();
    assert_eq!(
        h.erp.mutation_calls(),
        vec![RemoteCall::UpdateCustomer(RecordId::remote("CUS-000900"))]
    );
    let stored: Customer = h.store.get_by_id(&saved.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CustomerStatus::Inactive);
    assert_eq!(stored.sync_status, SyncMarker::Synced);
}

#[tokio::test]
async fn order_edits_are_repriced() {
    let h = Harness::new(false).await;
    let mut order = h
        .engine
        .create_offline_record(order_draft(&RecordId::remote("CUS-1"), &[(1, 1_000, 0)]))
        .await
        .unwrap();

    order.lines[0].quantity = 3;
    let saved = h.engine.update_offline_record(order).await.unwrap();
    assert_eq!(saved.subtotal, 3_000);
    assert_eq!(saved.tax, 450);
    assert_eq!(saved.total, 3_450);
}

#[tokio::test]
async fn updating_an_unknown_record_fails() {
    let h = Harness::new(false).await;
    let ghost = remote_customer("CUS-404", "ghost@acme.test");
    let err = h.engine.update_offline_record(ghost).await.unwrap_err();
    assert!(matches!(err, SyncError::RecordNotFound(id) if id.as_str() == "CUS-404"));
    assert!(h.engine.queue().list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_an_undelivered_record_leaves_nothing_to_send() {
    let h = Harness::new(false).await;
    let product = h
        .engine
        .create_offline_record(ProductDraft {
            sku: "new-1".to_string(),
            name: "Sample".to_string(),
            category: "Samples".to_string(),
            unit_price: 0,
            stock: 1,
        })
        .await
        .unwrap();
    assert_eq!(product.sku, "NEW-1");

    h.engine
        .delete_offline_record::<Product>(&product.id)
        .await
        .unwrap();
    assert!(h.engine.queue().list_all().await.unwrap().is_empty());
    assert_eq!(h.store.count(Collection::Products).await.unwrap(), 0);

    h.go_online();
    h.engine.sync_all().await.unwrap();
    assert!(h.erp.mutation_calls().is_empty());
}

#[tokio::test]
async fn deleting_a_synced_record_is_replayed_remotely() {
    let h = synced_harness().await;
    let id = RecordId::remote("PRD-000900");

    h.engine.delete_offline_record::<Product>(&id).await.unwrap();
    assert!(h.store.get_by_id::<Product>(&id).await.unwrap().is_none());

    let report = *h.engine.sync_all().await.unwrap().report().unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(h.erp.mutation_calls(), vec![RemoteCall::DeleteProduct(id.clone())]);
    assert!(h.erp.products().is_empty());
    assert!(h.store.get_by_id::<Product>(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn cancelling_a_synced_order_reaches_the_erp() {
    let h = synced_harness().await;
    h.engine
        .create_offline_record(order_draft(&RecordId::remote("CUS-000900"), &[(1, 800, 0)]))
        .await
        .unwrap();
    h.engine.sync_all().await.unwrap();
    h.erp.clear_calls();
    let id = RecordId::remote("ORD-000001");

    let cancelled = h.engine.cancel_offline_order(&id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.sync_status, SyncMarker::Pending);

    h.engine.sync_all().await.unwrap();
    assert_eq!(h.erp.mutation_calls(), vec![RemoteCall::CancelOrder(id.clone())]);
    let stored: Order = h.store.get_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Cancelled);
    assert_eq!(stored.sync_status, SyncMarker::Synced);

    let again = h.engine.cancel_offline_order(&id).await.unwrap_err();
    assert!(matches!(again, SyncError::Domain(_)));
}

#[tokio::test]
async fn cancelling_an_undelivered_order_drops_its_create() {
    let h = Harness::new(false).await;
    let order = h
        .engine
        .create_offline_record(order_draft(&RecordId::remote("CUS-1"), &[(1, 100, 0)]))
        .await
        .unwrap();

    let cancelled = h.engine.cancel_offline_order(&order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(h.engine.queue().list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn disabled_offline_mode_refuses_local_writes() {
    let h = Harness::with(
        false,
        OfflineConfig::default().with_enabled(false),
        MockErp::new(),
    )
    .await;

    let err = h
        .engine
        .create_offline_record(customer_draft("Acme", "buyer@acme.test"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::OfflineModeDisabled));
    assert_eq!(h.store.count(Collection::Customers).await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_drafts_are_rejected_before_any_write() {
    let h = Harness::new(false).await;
    let err = h
        .engine
        .create_offline_record(order_draft(&RecordId::remote("CUS-1"), &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Domain(_)));
    assert_eq!(h.store.count(Collection::Orders).await.unwrap(), 0);
    assert_eq!(h.store.count(Collection::SyncQueue).await.unwrap(), 0);
}

#[tokio::test]
async fn drafts_beyond_the_amount_range_are_rejected() {
    let h = Harness::new(false).await;
    let err = h
        .engine
        .create_offline_record(order_draft(
            &RecordId::remote("CUS-1"),
            &[(u32::MAX, u64::MAX / 2, 0)],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Domain(_)));
    assert_eq!(h.store.count(Collection::Orders).await.unwrap(), 0);
    assert_eq!(h.store.count(Collection::SyncQueue).await.unwrap(), 0);
}

#[tokio::test]
async fn overflowing_edits_leave_the_order_untouched() {
    let h = Harness::new(false).await;
    let order = h
        .engine
        .create_offline_record(order_draft(&RecordId::remote("CUS-1"), &[(1, 1_000, 0)]))
        .await
        .unwrap();

    let mut edited = order.clone();
    edited.lines[0].quantity = u32::MAX;
    edited.lines[0].unit_price = u64::MAX / 2;
    let err = h.engine.update_offline_record(edited).await.unwrap_err();
    assert!(matches!(err, SyncError::Domain(_)));

    let stored: Order = h.store.get_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored, order);
    assert_eq!(h.engine.queue().list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn operator_can_retry_a_terminally_failed_item() {
    let h = Harness::with(
        true,
        OfflineConfig::default().with_max_retry_attempts(1),
        MockErp::new(),
    )
    .await;
    let customer = h
        .engine
        .create_offline_record(customer_draft("Acme", "buyer@acme.test"))
        .await
        .unwrap();
    h.erp.fail_record(customer.id.clone());
    h.engine.sync_all().await.unwrap();

    let failed = h.engine.queue().list_failed().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(h.engine.status().await.unwrap().failed_count, 1);

    h.erp.clear_failures();
    let retried = h.engine.retry_failed(failed[0].id).await.unwrap();
    assert_eq!(retried.status, QueueStatus::Pending);
    h.engine.sync_all().await.unwrap();

    let status = h.engine.status().await.unwrap();
    assert_eq!(status.failed_count, 0);
    assert_eq!(status.pending_count, 0);
    let customers: Vec<Customer> = h.store.get_all().await.unwrap();
    assert_eq!(customers[0].id.as_str(), "CUS-000001");
}

#[tokio::test]
async fn offline_work_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = OfflineConfig::default()
        .with_db_dir(dir.path())
        .with_database("restart-test", 1);

    let app = OfflineApp::bootstrap(
        config.clone(),
        Arc::new(MockErp::new()),
        Arc::new(StaticProbe::new(false)),
    )
    .await
    .unwrap();
    let order = app
        .engine()
        .create_offline_record(order_draft(&RecordId::remote("CUS-1"), &[(2, 450, 500)]))
        .await
        .unwrap();
    app.close().await;

    let erp = Arc::new(MockErp::new());
    let app = OfflineApp::bootstrap(config, erp.clone(), Arc::new(StaticProbe::new(true)))
        .await
        .unwrap();
    let stored: Order = app.store().get_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored, order);
    assert_eq!(app.engine().status().await.unwrap().pending_count, 1);

    app.engine().sync_all().await.unwrap();
    assert_eq!(erp.mutation_calls(), vec![RemoteCall::CreateOrder(order.id.clone())]);
    app.close().await;
}

#[tokio::test]
async fn reopening_with_an_older_schema_version_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::on_disk(Some(dir.path().to_path_buf()));
    store.open_or_create("versioned", 3).await.unwrap();
    store.close().await;

    let err = OfflineApp::bootstrap(
        OfflineConfig::default()
            .with_db_dir(dir.path())
            .with_database("versioned", 2),
        Arc::new(MockErp::new()),
        Arc::new(StaticProbe::new(true)),
    )
    .await
    .err()
    .unwrap();

    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::VersionMismatch {
            stored: 3,
            requested: 2
        })
    ));
}

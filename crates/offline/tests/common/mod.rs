#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use salesdesk_core::{RecordId, SyncMarker};
use salesdesk_offline::{
    LocalStore, MockErp, OfflineConfig, ReachabilityMonitor, StatusBroadcaster, Subscription,
    SyncEngine, SyncStatus,
};
use salesdesk_parties::{Customer, CustomerDraft, CustomerStatus};
use salesdesk_products::Product;
use salesdesk_sales::{OrderDraft, OrderLineDraft};

/// An engine over an in-memory store and a mock ERP.
pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub erp: Arc<MockErp>,
    pub store: LocalStore,
}

impl Harness {
    pub async fn new(online: bool) -> Self {
        Self::with(online, OfflineConfig::default(), MockErp::new()).await
    }

    pub async fn with(online: bool, config: OfflineConfig, erp: MockErp) -> Self {
        let store = LocalStore::in_memory();
        store
            .open_or_create(&config.db_name, config.db_version)
            .await
            .expect("open in-memory store");

        let erp = Arc::new(erp);
        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            Arc::new(ReachabilityMonitor::new(online)),
            erp.clone(),
            StatusBroadcaster::new(),
            config,
        ));

        Self { engine, erp, store }
    }

    pub fn go_online(&self) {
        self.engine.reachability().set_online(true);
    }

    pub fn go_offline(&self) {
        self.engine.reachability().set_online(false);
    }

    /// Record every status the engine broadcasts.
    pub async fn record_statuses(&self) -> (Arc<Mutex<Vec<SyncStatus>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = self
            .engine
            .subscribe(move |status| sink.lock().unwrap().push(status.clone()))
            .await;
        (seen, sub)
    }
}

pub fn order_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, 20).unwrap()
}

/// Order draft with `(quantity, unit_price, discount_bps)` lines.
pub fn order_draft(customer_id: &RecordId, lines: &[(u32, u64, u32)]) -> OrderDraft {
    OrderDraft {
        customer_id: customer_id.clone(),
        date: order_date(),
        lines: lines
            .iter()
            .enumerate()
            .map(|(idx, (quantity, unit_price, discount_bps))| OrderLineDraft {
                product_id: RecordId::remote(format!("PRD-{:06}", idx + 1)),
                sku: format!("SKU-{}", idx + 1),
                description: format!("Item {}", idx + 1),
                quantity: *quantity,
                unit_price: *unit_price,
                discount_bps: *discount_bps,
            })
            .collect(),
        notes: None,
    }
}

pub fn customer_draft(name: &str, email: &str) -> CustomerDraft {
    CustomerDraft {
        name: name.to_string(),
        email: email.to_string(),
        phone: None,
        address: None,
    }
}

pub fn remote_customer(id: &str, email: &str) -> Customer {
    Customer {
        id: RecordId::remote(id),
        name: format!("Customer {id}"),
        email: email.to_string(),
        phone: Some("+1 555 0100".to_string()),
        address: None,
        status: CustomerStatus::Active,
        created_at: Utc::now(),
        sync_status: SyncMarker::Synced,
    }
}

pub fn remote_product(id: &str, sku: &str, category: &str) -> Product {
    Product {
        id: RecordId::remote(id),
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        category: category.to_string(),
        unit_price: 1_250,
        stock: 40,
        active: true,
        updated_at: Utc::now(),
        sync_status: SyncMarker::Synced,
    }
}

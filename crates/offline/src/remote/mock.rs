//! In-memory ERP used by tests and local development.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use salesdesk_core::{RecordId, SyncMarker};
use salesdesk_parties::Customer;
use salesdesk_products::Product;
use salesdesk_sales::{Order, OrderStatus};

use super::{Page, RemoteError, RemoteService};

/// A call received by [`MockErp`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreateOrder(RecordId),
    UpdateOrder(RecordId),
    CancelOrder(RecordId),
    CreateCustomer(RecordId),
    UpdateCustomer(RecordId),
    DeleteCustomer(RecordId),
    CreateProduct(RecordId),
    UpdateProduct(RecordId),
    DeleteProduct(RecordId),
    ListOrders { page: u32, page_size: u32 },
    ListCustomers { page: u32, page_size: u32 },
    ListProducts { page: u32, page_size: u32 },
}

impl RemoteCall {
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            RemoteCall::ListOrders { .. }
                | RemoteCall::ListCustomers { .. }
                | RemoteCall::ListProducts { .. }
        )
    }
}

#[derive(Debug, Default)]
struct MockState {
    orders: Vec<Order>,
    customers: Vec<Customer>,
    products: Vec<Product>,
    order_seq: u64,
    customer_seq: u64,
    product_seq: u64,
    calls: Vec<RemoteCall>,
    fail_next: u32,
    failing_records: HashSet<RecordId>,
    fail_lists: bool,
}

/// Mock ERP integration layer.
///
/// Assigns `ORD-000001` style ids, confirms orders with the shared pricing,
/// records every call and can inject transport failures.
#[derive(Debug, Default)]
pub struct MockErp {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockErp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` after it is recorded.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.state().fail_next = n;
    }

    /// Fail every mutation of `id` until cleared.
    pub fn fail_record(&self, id: RecordId) {
        self.state().failing_records.insert(id);
    }

    /// Fail every list call until cleared.
    pub fn fail_lists(&self, fail: bool) {
        self.state().fail_lists = fail;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fail_next = 0;
        state.failing_records.clear();
        state.fail_lists = false;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state().calls.clone()
    }

    /// Calls that mutate remote state, in arrival order.
    pub fn mutation_calls(&self) -> Vec<RemoteCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state().orders.clone()
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.state().customers.clone()
    }

    pub fn products(&self) -> Vec<Product> {
        self.state().products.clone()
    }

    /// Add orders as if the ERP held them. Orders that cannot be priced are skipped.
    pub fn seed_orders(&self, orders: impl IntoIterator<Item = Order>) {
        self.state()
            .orders
            .extend(orders.into_iter().filter_map(|order| synced_order(order).ok()));
    }

    pub fn seed_customers(&self, customers: impl IntoIterator<Item = Customer>) {
        self.state().customers.extend(customers.into_iter().map(|mut c| {
            c.sync_status = SyncMarker::Synced;
            c
        }));
    }

    pub fn seed_products(&self, products: impl IntoIterator<Item = Product>) {
        self.state().products.extend(products.into_iter().map(|mut p| {
            p.sync_status = SyncMarker::Synced;
            p
        }));
    }

    /// Record a call and apply injected failures.
    async fn begin(&self, call: RemoteCall) -> Result<(), RemoteError> {
        let outcome = {
            let mut state = self.state();
            let target = match &call {
                RemoteCall::CreateOrder(id)
                | RemoteCall::UpdateOrder(id)
                | RemoteCall::CancelOrder(id)
                | RemoteCall::CreateCustomer(id)
                | RemoteCall::UpdateCustomer(id)
                | RemoteCall::DeleteCustomer(id)
                | RemoteCall::CreateProduct(id)
                | RemoteCall::UpdateProduct(id)
                | RemoteCall::DeleteProduct(id) => Some(id.clone()),
                _ => None,
            };
            let is_list = !call.is_mutation();
            state.calls.push(call);

            if state.fail_next > 0 {
                state.fail_next -= 1;
                Err(RemoteError::Transport("injected failure".to_string()))
            } else if is_list && state.fail_lists {
                Err(RemoteError::Transport("list unavailable".to_string()))
            } else if target.is_some_and(|id| state.failing_records.contains(&id)) {
                Err(RemoteError::Transport("connection reset".to_string()))
            } else {
                Ok(())
            }
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}

fn synced_order(mut order: Order) -> Result<Order, RemoteError> {
    order
        .recompute_totals()
        .map_err(|err| RemoteError::Validation(err.to_string()))?;
    order.sync_status = SyncMarker::Synced;
    Ok(order)
}

fn page_of<T: Clone>(items: &[T], page: u32, page_size: u32) -> Page<T> {
    let page = page.max(1);
    let start = (page as usize - 1).saturating_mul(page_size as usize);
    Page {
        items: items
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect(),
        page,
        page_size,
        total: items.len() as u64,
    }
}

#[async_trait]
impl RemoteService for MockErp {
    async fn create_order(&self, order: &Order) -> Result<Order, RemoteError> {
        self.begin(RemoteCall::CreateOrder(order.id.clone())).await?;

        if order.lines.is_empty() {
            return Err(RemoteError::Validation("order has no lines".to_string()));
        }
        if order.customer_id.is_local() {
            return Err(RemoteError::Validation(format!(
                "unknown customer {}",
                order.customer_id
            )));
        }

        let mut created = synced_order(order.clone())?;
        let mut state = self.state();
        state.order_seq += 1;
        created.id = RecordId::remote(format!("ORD-{:06}", state.order_seq));
        created.reference = format!("SO-{:06}", state.order_seq);
        created.status = OrderStatus::Confirmed;
        state.orders.push(created.clone());
        Ok(created)
    }

    async fn update_order(&self, order: &Order) -> Result<Order, RemoteError> {
        self.begin(RemoteCall::UpdateOrder(order.id.clone())).await?;

        let mut state = self.state();
        let slot = state
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or_else(|| RemoteError::NotFound(order.id.clone()))?;
        if slot.status == OrderStatus::Cancelled {
            return Err(RemoteError::Validation(format!(
                "order {} is cancelled",
                order.id
            )));
        }

        let mut updated = synced_order(order.clone())?;
        updated.reference = slot.reference.clone();
        *slot = updated;
        Ok(slot.clone())
    }

    async fn cancel_order(&self, id: &RecordId) -> Result<Order, RemoteError> {
        self.begin(RemoteCall::CancelOrder(id.clone())).await?;

        let mut state = self.state();
        let slot = state
            .orders
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.clone()))?;
        slot.cancel()
            .map_err(|e| RemoteError::Validation(e.to_string()))?;
        Ok(slot.clone())
    }

    async fn create_customer(&self, customer: &Customer) -> Result<Customer, RemoteError> {
        self.begin(RemoteCall::CreateCustomer(customer.id.clone()))
            .await?;

        let mut state = self.state();
        if state.customers.iter().any(|c| c.email == customer.email) {
            return Err(RemoteError::Validation(format!(
                "email {} already registered",
                customer.email
            )));
        }

        state.customer_seq += 1;
        let mut created = customer.clone();
        created.id = RecordId::remote(format!("CUS-{:06}", state.customer_seq));
        created.sync_status = SyncMarker::Synced;
        state.customers.push(created.clone());
        Ok(created)
    }

    async fn update_customer(&self, customer: &Customer) -> Result<Customer, RemoteError> {
        self.begin(RemoteCall::UpdateCustomer(customer.id.clone()))
            .await?;

        let mut state = self.state();
        let slot = state
            .customers
            .iter_mut()
            .find(|c| c.id == customer.id)
            .ok_or_else(|| RemoteError::NotFound(customer.id.clone()))?;
        *slot = customer.clone();
        slot.sync_status = SyncMarker::Synced;
        Ok(slot.clone())
    }

    async fn delete_customer(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.begin(RemoteCall::DeleteCustomer(id.clone())).await?;

        let mut state = self.state();
        let before = state.customers.len();
        state.customers.retain(|c| &c.id != id);
        if state.customers.len() == before {
            return Err(RemoteError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn create_product(&self, product: &Product) -> Result<Product, RemoteError> {
        self.begin(RemoteCall::CreateProduct(product.id.clone()))
            .await?;

        let mut state = self.state();
        if state.products.iter().any(|p| p.sku == product.sku) {
            return Err(RemoteError::Validation(format!(
                "sku {} already exists",
                product.sku
            )));
        }

        state.product_seq += 1;
        let mut created = product.clone();
        created.id = RecordId::remote(format!("PRD-{:06}", state.product_seq));
        created.sync_status = SyncMarker::Synced;
        state.products.push(created.clone());
        Ok(created)
    }

    async fn update_product(&self, product: &Product) -> Result<Product, RemoteError> {
        self.begin(RemoteCall::UpdateProduct(product.id.clone()))
            .await?;

        let mut state = self.state();
        let slot = state
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| RemoteError::NotFound(product.id.clone()))?;
        *slot = product.clone();
        slot.sync_status = SyncMarker::Synced;
        Ok(slot.clone())
    }

    async fn delete_product(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.begin(RemoteCall::DeleteProduct(id.clone())).await?;

        let mut state = self.state();
        let before = state.products.len();
        state.products.retain(|p| &p.id != id);
        if state.products.len() == before {
            return Err(RemoteError::NotFound(id.clone()));
        }
        Ok(())
    }

    async fn list_orders(&self, page: u32, page_size: u32) -> Result<Page<Order>, RemoteError> {
        self.begin(RemoteCall::ListOrders { page, page_size }).await?;
        Ok(page_of(&self.state().orders, page, page_size))
    }

    async fn list_customers(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Customer>, RemoteError> {
        self.begin(RemoteCall::ListCustomers { page, page_size })
            .await?;
        Ok(page_of(&self.state().customers, page, page_size))
    }

    async fn list_products(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Product>, RemoteError> {
        self.begin(RemoteCall::ListProducts { page, page_size })
            .await?;
        Ok(page_of(&self.state().products, page, page_size))
    }
}

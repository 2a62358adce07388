//! Contract of the remote ERP service consumed by the sync engine.
//!
//! Authentication, pagination format and server-side validation stay behind
//! this trait. The engine only sees a success payload or a [`RemoteError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use salesdesk_core::RecordId;
use salesdesk_parties::Customer;
use salesdesk_products::Product;
use salesdesk_sales::Order;

#[cfg(feature = "http")]
pub mod http;
pub mod mock;

pub use mock::{MockErp, RemoteCall};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network or server failure; the mutation may be retried.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by remote validation: {0}")]
    Validation(String),
    #[error("remote record {0} not found")]
    NotFound(RecordId),
    #[error("remote service does not support {0}")]
    Unsupported(&'static str),
}

/// One page of a remote collection. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            page,
            page_size,
            total: 0,
        }
    }
}

/// Remote ERP operations.
///
/// Create and update calls return the authoritative record, which may carry a
/// different id than the one sent.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn create_order(&self, order: &Order) -> Result<Order, RemoteError>;

    async fn update_order(&self, order: &Order) -> Result<Order, RemoteError>;

    async fn cancel_order(&self, id: &RecordId) -> Result<Order, RemoteError>;

    async fn create_customer(&self, customer: &Customer) -> Result<Customer, RemoteError>;

    async fn update_customer(&self, customer: &Customer) -> Result<Customer, RemoteError>;

    async fn list_orders(&self, page: u32, page_size: u32) -> Result<Page<Order>, RemoteError>;

    async fn list_customers(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Customer>, RemoteError>;

    async fn list_products(&self, page: u32, page_size: u32)
    -> Result<Page<Product>, RemoteError>;

    async fn delete_customer(&self, _id: &RecordId) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported("delete_customer"))
    }

    async fn create_product(&self, _product: &Product) -> Result<Product, RemoteError> {
        Err(RemoteError::Unsupported("create_product"))
    }

    async fn update_product(&self, _product: &Product) -> Result<Product, RemoteError> {
        Err(RemoteError::Unsupported("update_product"))
    }

    async fn delete_product(&self, _id: &RecordId) -> Result<(), RemoteError> {
        Err(RemoteError::Unsupported("delete_product"))
    }
}

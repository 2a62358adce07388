//! HTTP client for the ERP REST API and a health-endpoint connectivity probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use salesdesk_core::RecordId;
use salesdesk_parties::Customer;
use salesdesk_products::Product;
use salesdesk_sales::Order;

use super::{Page, RemoteError, RemoteService};
use crate::reachability::ConnectivityProbe;

/// ERP API client.
#[derive(Debug, Clone)]
pub struct HttpRemoteService {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl HttpRemoteService {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Client that authenticates every request with a bearer token.
    pub fn with_token(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::new(api_url)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(
        &self,
        req: RequestBuilder,
        target: Option<&RecordId>,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = req
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match (status, target) {
            (StatusCode::NOT_FOUND, Some(id)) => RemoteError::NotFound(id.clone()),
            (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT, _) => {
                RemoteError::Validation(body)
            }
            _ => RemoteError::Transport(format!("HTTP {status}: {body}")),
        })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        target: Option<&RecordId>,
    ) -> Result<T, RemoteError> {
        self.send(req, target)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Transport(format!("invalid response body: {e}")))
    }

    async fn list<T: DeserializeOwned>(
        &self,
        resource: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<T>, RemoteError> {
        let path = format!("/{resource}?page={page}&page_size={page_size}");
        self.json(self.request(Method::GET, &path), None).await
    }
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn create_order(&self, order: &Order) -> Result<Order, RemoteError> {
        self.json(self.request(Method::POST, "/orders").json(order), None)
            .await
    }

    async fn update_order(&self, order: &Order) -> Result<Order, RemoteError> {
        let path = format!("/orders/{}", order.id);
        self.json(self.request(Method::PUT, &path).json(order), Some(&order.id))
            .await
    }

    async fn cancel_order(&self, id: &RecordId) -> Result<Order, RemoteError> {
        let path = format!("/orders/{id}/cancel");
        self.json(self.request(Method::POST, &path), Some(id)).await
    }

    async fn create_customer(&self, customer: &Customer) -> Result<Customer, RemoteError> {
        self.json(self.request(Method::POST, "/customers").json(customer), None)
            .await
    }

    async fn update_customer(&self, customer: &Customer) -> Result<Customer, RemoteError> {
        let path = format!("/customers/{}", customer.id);
        self.json(
            self.request(Method::PUT, &path).json(customer),
            Some(&customer.id),
        )
        .await
    }

    async fn delete_customer(&self, id: &RecordId) -> Result<(), RemoteError> {
        let path = format!("/customers/{id}");
        self.send(self.request(Method::DELETE, &path), Some(id))
            .await
            .map(|_| ())
    }

    async fn create_product(&self, product: &Product) -> Result<Product, RemoteError> {
        self.json(self.request(Method::POST, "/products").json(product), None)
            .await
    }

    async fn update_product(&self, product: &Product) -> Result<Product, RemoteError> {
        let path = format!("/products/{}", product.id);
        self.json(
            self.request(Method::PUT, &path).json(product),
            Some(&product.id),
        )
        .await
    }

    async fn delete_product(&self, id: &RecordId) -> Result<(), RemoteError> {
        let path = format!("/products/{id}");
        self.send(self.request(Method::DELETE, &path), Some(id))
            .await
            .map(|_| ())
    }

    async fn list_orders(&self, page: u32, page_size: u32) -> Result<Page<Order>, RemoteError> {
        self.list("orders", page, page_size).await
    }

    async fn list_customers(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Customer>, RemoteError> {
        self.list("customers", page, page_size).await
    }

    async fn list_products(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Product>, RemoteError> {
        self.list("products", page, page_size).await
    }
}

/// Connectivity check against `GET {api_url}/health`.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        Self {
            client: Client::new(),
            url: format!("{}/health", api_url.trim_end_matches('/')),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ConnectivityProbe for HttpHealthProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.url).timeout(self.timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(url = %self.url, error = %err, "health check failed");
                false
            }
        }
    }
}

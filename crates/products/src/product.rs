use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, Entity, RecordId, SyncMarker};

/// Input for a new catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub sku: String,
    pub name: String,
    pub category: String,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    #[serde(default)]
    pub stock: i64,
}

impl ProductDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        Ok(())
    }

    pub fn into_product(
        self,
        id: RecordId,
        sync_status: SyncMarker,
        now: DateTime<Utc>,
    ) -> Result<Product, DomainError> {
        self.validate()?;
        Ok(Product {
            id,
            sku: self.sku.trim().to_uppercase(),
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            unit_price: self.unit_price,
            stock: self.stock,
            active: true,
            updated_at: now,
            sync_status,
        })
    }
}

/// Catalog entry as cached on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: RecordId,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub unit_price: u64,
    pub stock: i64,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncMarker,
}

impl Product {
    pub fn is_orderable(&self) -> bool {
        self.active && self.stock > 0
    }
}

impl Entity for Product {
    fn id(&self) -> &RecordId {
        &self.id
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use salesdesk_core::{DomainError, Entity, RecordId, SyncMarker};

use crate::pricing::{self, FULL_DISCOUNT_BPS, Totals};

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    /// Captured by a salesperson, awaiting ERP confirmation.
    Submitted,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Submitted => "submitted",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Order line as entered by the salesperson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineDraft {
    pub product_id: RecordId,
    pub sku: String,
    pub description: String,
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    /// Discount in basis points (1000 = 10%).
    #[serde(default)]
    pub discount_bps: u32,
}

impl OrderLineDraft {
    fn validate(&self, line_no: usize) -> Result<(), DomainError> {
        if self.quantity == 0 {
            return Err(DomainError::validation(format!(
                "line {line_no}: quantity must be positive"
            )));
        }
        if self.unit_price == 0 {
            return Err(DomainError::validation(format!(
                "line {line_no}: unit_price must be positive"
            )));
        }
        if self.discount_bps > FULL_DISCOUNT_BPS {
            return Err(DomainError::validation(format!(
                "line {line_no}: discount cannot exceed 100%"
            )));
        }
        if pricing::line_net(self.quantity, self.unit_price, self.discount_bps).is_none() {
            return Err(DomainError::validation(format!(
                "line {line_no}: amount exceeds the supported range"
            )));
        }
        Ok(())
    }

    /// Line without its net; [`Order::recompute_totals`] prices it.
    fn unpriced(self, line_no: u32) -> OrderLine {
        OrderLine {
            line_no,
            product_id: self.product_id,
            sku: self.sku,
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount_bps: self.discount_bps,
            net: 0,
        }
    }
}

/// Priced order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub product_id: RecordId,
    pub sku: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: u64,
    pub discount_bps: u32,
    /// Discounted line amount, before tax.
    pub net: u64,
}

/// Input for a new order (offline form or ERP create request).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer_id: RecordId,
    pub date: NaiveDate,
    pub lines: Vec<OrderLineDraft>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OrderDraft {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_id.as_str().trim().is_empty() {
            return Err(DomainError::validation("customer_id is required"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("order needs at least one line"));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            line.validate(idx + 1)?;
        }
        let amounts = self
            .lines
            .iter()
            .map(|l| (l.quantity, l.unit_price, l.discount_bps));
        if pricing::totals(amounts).is_none() {
            return Err(out_of_range());
        }
        Ok(())
    }

    /// Price the draft into a full order.
    ///
    /// Validation runs first; nothing is produced for an invalid draft.
    pub fn into_order(
        self,
        id: RecordId,
        reference: String,
        status: OrderStatus,
        sync_status: SyncMarker,
        now: DateTime<Utc>,
    ) -> Result<Order, DomainError> {
        self.validate()?;

        let lines: Vec<OrderLine> = self
            .lines
            .into_iter()
            .enumerate()
            .map(|(idx, line)| line.unpriced(idx as u32 + 1))
            .collect();

        let mut order = Order {
            id,
            reference,
            customer_id: self.customer_id,
            date: self.date,
            status,
            lines,
            subtotal: 0,
            tax: 0,
            total: 0,
            notes: self.notes,
            created_at: now,
            sync_status,
        };
        order.recompute_totals()?;
        Ok(order)
    }
}

/// Sales order as cached on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: RecordId,
    /// Order number shown to people; offline orders carry an `OFF-` number.
    pub reference: String,
    pub customer_id: RecordId,
    pub date: NaiveDate,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub subtotal: u64,
    pub tax: u64,
    pub total: u64,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sync_status: SyncMarker,
}

impl Order {
    pub fn totals(&self) -> Totals {
        Totals {
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
        }
    }

    /// Re-price every line and the order amounts.
    ///
    /// Fails without touching the order when an amount leaves the `u64` range.
    pub fn recompute_totals(&mut self) -> Result<(), DomainError> {
        let totals = pricing::totals(
            self.lines
                .iter()
                .map(|l| (l.quantity, l.unit_price, l.discount_bps)),
        )
        .ok_or_else(out_of_range)?;

        for line in &mut self.lines {
            line.net = pricing::line_net(line.quantity, line.unit_price, line.discount_bps)
                .ok_or_else(out_of_range)?;
        }
        self.subtotal = totals.subtotal;
        self.tax = totals.tax;
        self.total = totals.total;
        Ok(())
    }

    pub fn is_cancellable(&self) -> bool {
        !matches!(self.status, OrderStatus::Cancelled)
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if !self.is_cancellable() {
            return Err(DomainError::invariant("order is already cancelled"));
        }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }
}

fn out_of_range() -> DomainError {
    DomainError::validation("order amounts exceed the supported range")
}

impl Entity for Order {
    fn id(&self) -> &RecordId {
        &self.id
    }
}

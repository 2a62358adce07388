//! Sales orders domain module.
//!
//! This crate contains the order shape cached on the device and the pricing
//! arithmetic shared by offline creation and the ERP, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;
pub mod pricing;

pub use order::{Order, OrderDraft, OrderLine, OrderLineDraft, OrderStatus};
pub use pricing::{TAX_RATE_PERCENT, Totals, line_net, tax_for, totals};

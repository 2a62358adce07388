//! Parties domain module (customers visited by the sales team).
//!
//! Pure domain logic: customer shape, draft validation, no IO.

pub mod customer;

pub use customer::{Customer, CustomerDraft, CustomerStatus, validate_email};

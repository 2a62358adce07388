//! `salesdesk-core`: shared building blocks for the salesdesk domain crates.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! record identity, the local sync marker and the domain error model.

pub mod entity;
pub mod error;
pub mod id;
pub mod sync_marker;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{RecordId, is_local_reference, local_reference};
pub use sync_marker::SyncMarker;

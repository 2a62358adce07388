//! Products domain module (catalog entries browsed by the sales team).
//!
//! Pure domain logic: product shape and draft validation, no IO.

pub mod product;

pub use product::{Product, ProductDraft};

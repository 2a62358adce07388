//! Entity trait: identity + continuity across state changes.

use crate::id::RecordId;

/// Entity marker + minimal interface.
///
/// Every record that can be cached locally or mutated offline is keyed by a
/// [`RecordId`], whether the key was minted on the device or by the ERP.
pub trait Entity {
    /// Returns the entity identifier.
    fn id(&self) -> &RecordId;
}

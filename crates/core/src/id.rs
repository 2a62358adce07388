//! Record identifiers shared by every cached collection.

use core::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

const LOCAL_PREFIX: &str = "local-";
const LOCAL_REFERENCE_PREFIX: &str = "OFF-";

/// Globally unique string key of a cached record.
///
/// Keys minted on the device while offline carry a `local-` prefix so they can
/// be told apart from keys assigned by the ERP once the record is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Mint a device-local identifier.
    ///
    /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
    /// for determinism.
    pub fn new_local() -> Self {
        Self(format!("{LOCAL_PREFIX}{}", Uuid::now_v7()))
    }

    /// Wrap a key assigned by the remote system.
    pub fn remote(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key was minted on the device and has not been reconciled.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }
}

impl core::fmt::Display for RecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_id("RecordId: empty key"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Human-readable reference for a record created on the device.
///
/// Shape: `OFF-<YYYYMMDD>-<HHMMSS>-<4 hex>`. The ERP never issues numbers with
/// the `OFF-` prefix, so local references cannot collide with remote ones.
pub fn local_reference(now: DateTime<Utc>) -> String {
    let entropy = Uuid::now_v7().simple().to_string();
    let suffix = &entropy[entropy.len() - 4..];
    format!(
        "{LOCAL_REFERENCE_PREFIX}{}-{}",
        now.format("%Y%m%d-%H%M%S"),
        suffix.to_uppercase()
    )
}

/// Whether a reference number was minted by [`local_reference`].
pub fn is_local_reference(reference: &str) -> bool {
    reference.starts_with(LOCAL_REFERENCE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_prefixed_and_unique() {
        let a = RecordId::new_local();
        let b = RecordId::new_local();

        assert!(a.is_local());
        assert!(a.as_str().starts_with("local-"));
        assert_ne!(a, b);
    }

    #[test]
    fn remote_ids_are_not_local() {
        let id = RecordId::remote("ORD-000001");
        assert!(!id.is_local());
        assert_eq!(id.to_string(), "ORD-000001");
    }

    #[test]
    fn parse_rejects_blank_keys() {
        assert!(matches!(
            "   ".parse::<RecordId>(),
            Err(DomainError::InvalidId(_))
        ));
        assert_eq!("C-1".parse::<RecordId>().unwrap(), RecordId::remote("C-1"));
    }

    #[test]
    fn local_reference_has_offline_shape() {
        let now = DateTime::parse_from_rfc3339("2026-03-04T05:06:07Z")
            .unwrap()
            .with_timezone(&Utc);
        let reference = local_reference(now);

        assert!(reference.starts_with("OFF-20260304-050607-"));
        assert_eq!(reference.len(), "OFF-20260304-050607-ABCD".len());
        assert!(is_local_reference(&reference));
        assert!(!is_local_reference("SO-2026-0001"));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = RecordId::remote("P-9");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"P-9\"");
    }
}

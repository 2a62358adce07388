//! Per-record marker telling whether the ERP has seen the latest local state.

use serde::{Deserialize, Serialize};

/// Sync state of a cached record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMarker {
    /// Matches the authoritative remote copy.
    #[default]
    Synced,
    /// Changed locally; a queue item is waiting to deliver it.
    Pending,
}

impl SyncMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMarker::Synced => "synced",
            SyncMarker::Pending => "pending",
        }
    }
}

impl core::fmt::Display for SyncMarker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

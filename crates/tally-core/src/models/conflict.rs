//! Import conflict model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ComparableField, ConsolidatedRecord, SightingKey};

/// Two differing versions of the same sighting awaiting a human decision.
///
/// Lives only for the duration of one import; resolving it produces a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Entity id shared by both versions
    pub id: String,
    pub existing: ConsolidatedRecord,
    pub incoming: ConsolidatedRecord,
    pub existing_value: DateTime<Utc>,
    pub incoming_value: DateTime<Utc>,
    /// Comparable fields whose values differ
    pub differing_fields: Vec<ComparableField>,
}

impl Conflict {
    #[must_use]
    pub fn new(
        existing: ConsolidatedRecord,
        incoming: ConsolidatedRecord,
        differing_fields: Vec<ComparableField>,
    ) -> Self {
        Self {
            id: existing.id(),
            existing_value: existing.last_updated,
            incoming_value: incoming.last_updated,
            existing,
            incoming,
            differing_fields,
        }
    }

    #[must_use]
    pub fn key(&self) -> SightingKey {
        self.existing.key()
    }
}

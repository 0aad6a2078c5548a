//! Base station consolidated record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SightingKey, SightingRecord};

/// The base station's belief about one runner at one checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedRecord {
    pub record: SightingRecord,
    /// When this version was produced; context for humans, never a tie-breaker
    pub last_updated: DateTime<Utc>,
}

impl ConsolidatedRecord {
    #[must_use]
    pub const fn new(record: SightingRecord, last_updated: DateTime<Utc>) -> Self {
        Self {
            record,
            last_updated,
        }
    }

    #[must_use]
    pub fn key(&self) -> SightingKey {
        self.record.key()
    }

    /// Entity id, `race/checkpoint/runner`
    #[must_use]
    pub fn id(&self) -> String {
        self.key().to_string()
    }
}

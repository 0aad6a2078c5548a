//! Imported checkpoint snapshot model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RaceId, SightingRecord};

/// The base station's cached copy of one checkpoint's latest full export.
///
/// Replaced wholesale on every import of that checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedCheckpointSnapshot {
    pub race_id: RaceId,
    pub checkpoint_number: u32,
    pub imported_at: DateTime<Utc>,
    pub runners: Vec<SightingRecord>,
}

impl ImportedCheckpointSnapshot {
    #[must_use]
    pub fn new(race_id: RaceId, checkpoint_number: u32, runners: Vec<SightingRecord>) -> Self {
        Self {
            race_id,
            checkpoint_number,
            imported_at: Utc::now(),
            runners,
        }
    }

    /// Record for `runner_number`, if this checkpoint reported one
    #[must_use]
    pub fn runner(&self, runner_number: u32) -> Option<&SightingRecord> {
        self.runners
            .iter()
            .find(|record| record.runner_number == runner_number)
    }
}

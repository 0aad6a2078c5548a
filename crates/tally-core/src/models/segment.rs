//! Time segment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SightingRecord;

/// Sightings whose mark-off time falls into the same fixed-width bucket.
///
/// Derived on demand from the current sightings and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSegment {
    /// Bucket identifier shown to operators
    pub common_time_label: String,
    /// Start of the bucket
    pub common_time: DateTime<Utc>,
    /// Members ordered by runner number
    pub members: Vec<SightingRecord>,
    /// True only when every member has been called in
    pub called_in: bool,
}

impl TimeSegment {
    #[must_use]
    pub fn runner_numbers(&self) -> Vec<u32> {
        self.members.iter().map(|member| member.runner_number).collect()
    }

    /// Members still waiting to be radioed through
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.members.iter().filter(|member| !member.called_in).count()
    }
}

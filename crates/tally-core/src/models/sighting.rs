//! Sighting model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RaceId;
use crate::error::Error;

/// Progress of a runner as seen from one checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunnerStatus {
    NotStarted,
    Passed,
    Withdrawn,
    VetOut,
    Dnf,
}

impl RunnerStatus {
    pub const ALL: [Self; 5] = [
        Self::NotStarted,
        Self::Passed,
        Self::Withdrawn,
        Self::VetOut,
        Self::Dnf,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::Passed => "passed",
            Self::Withdrawn => "withdrawn",
            Self::VetOut => "vet-out",
            Self::Dnf => "dnf",
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunnerStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown runner status '{s}'")))
    }
}

/// Identity of a sighting: at most one current record exists per key in a store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SightingKey {
    pub race_id: RaceId,
    pub checkpoint_number: u32,
    pub runner_number: u32,
}

impl SightingKey {
    #[must_use]
    pub const fn new(race_id: RaceId, checkpoint_number: u32, runner_number: u32) -> Self {
        Self {
            race_id,
            checkpoint_number,
            runner_number,
        }
    }
}

impl fmt::Display for SightingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.race_id, self.checkpoint_number, self.runner_number
        )
    }
}

/// One runner's observation at one checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SightingRecord {
    pub race_id: RaceId,
    pub checkpoint_number: u32,
    pub runner_number: u32,
    pub status: RunnerStatus,
    /// When the runner was physically observed
    pub mark_off_time: Option<DateTime<Utc>>,
    /// When the sighting was radioed through to base
    pub call_in_time: Option<DateTime<Utc>>,
    pub called_in: bool,
    pub notes: Option<String>,
}

impl SightingRecord {
    /// A fresh record with nothing observed yet
    #[must_use]
    pub const fn new(race_id: RaceId, checkpoint_number: u32, runner_number: u32) -> Self {
        Self {
            race_id,
            checkpoint_number,
            runner_number,
            status: RunnerStatus::NotStarted,
            mark_off_time: None,
            call_in_time: None,
            called_in: false,
            notes: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> SightingKey {
        SightingKey::new(
            self.race_id.clone(),
            self.checkpoint_number,
            self.runner_number,
        )
    }

    /// Builder-style status/time setter used by tests and fixtures
    #[must_use]
    pub const fn with_status(
        mut self,
        status: RunnerStatus,
        mark_off_time: Option<DateTime<Utc>>,
    ) -> Self {
        self.status = status;
        self.mark_off_time = mark_off_time;
        self
    }
}

/// What happened to the prior value archived in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditAction {
    /// Checkpoint operator corrected a record
    Updated,
    /// Checkpoint operator removed a record (soft delete)
    Deleted,
    /// Base station replaced its consolidated value on import resolution
    Resolved,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Resolved => "resolved",
        }
    }
}

impl FromStr for AuditAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updated" => Ok(Self::Updated),
            "deleted" => Ok(Self::Deleted),
            "resolved" => Ok(Self::Resolved),
            other => Err(Error::InvalidInput(format!("unknown audit action '{other}'"))),
        }
    }
}

/// Append-only history entry holding the value a write replaced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub action: AuditAction,
    pub previous: SightingRecord,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(action: AuditAction, previous: SightingRecord) -> Self {
        Self {
            id: uuid::Uuid::now_v7(),
            action,
            previous,
            recorded_at: Utc::now(),
        }
    }
}

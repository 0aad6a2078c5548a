//! Data models for Tally

mod conflict;
mod consolidated;
mod race;
mod segment;
mod settings;
mod sighting;
mod snapshot;

pub use conflict::Conflict;
pub use consolidated::ConsolidatedRecord;
pub use race::{Race, RaceId};
pub use segment::TimeSegment;
pub use settings::{
    format_comparable_fields, parse_comparable_fields, ComparableField, Settings,
    DEFAULT_BUCKET_WIDTH_MINUTES,
};
pub use sighting::{AuditAction, AuditEntry, RunnerStatus, SightingKey, SightingRecord};
pub use snapshot::ImportedCheckpointSnapshot;

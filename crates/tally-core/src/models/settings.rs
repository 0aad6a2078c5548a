//! Engine settings model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::SightingRecord;
use crate::error::Error;

/// Default segment width in minutes
pub const DEFAULT_BUCKET_WIDTH_MINUTES: u32 = 5;

/// A sighting field that takes part in the redundant-vs-conflicting test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparableField {
    Status,
    MarkOffTime,
    CallInTime,
    Notes,
    CalledIn,
}

impl ComparableField {
    pub const ALL: [Self; 5] = [
        Self::Status,
        Self::MarkOffTime,
        Self::CallInTime,
        Self::Notes,
        Self::CalledIn,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::MarkOffTime => "mark-off-time",
            Self::CallInTime => "call-in-time",
            Self::Notes => "notes",
            Self::CalledIn => "called-in",
        }
    }

    /// Whether `left` and `right` agree on this field
    #[must_use]
    pub fn matches(self, left: &SightingRecord, right: &SightingRecord) -> bool {
        match self {
            Self::Status => left.status == right.status,
            Self::MarkOffTime => left.mark_off_time == right.mark_off_time,
            Self::CallInTime => left.call_in_time == right.call_in_time,
            Self::Notes => normalized_notes(left) == normalized_notes(right),
            Self::CalledIn => left.called_in == right.called_in,
        }
    }
}

// Blank notes and missing notes are the same thing to an operator.
fn normalized_notes(record: &SightingRecord) -> Option<&str> {
    record
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|notes| !notes.is_empty())
}

impl fmt::Display for ComparableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComparableField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown comparable field '{s}'")))
    }
}

/// Engine settings persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Width of a time segment in minutes
    pub bucket_width_minutes: u32,
    /// Fields compared when deciding whether an import is redundant
    pub comparable_fields: Vec<ComparableField>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bucket_width_minutes: DEFAULT_BUCKET_WIDTH_MINUTES,
            comparable_fields: vec![
                ComparableField::Status,
                ComparableField::MarkOffTime,
                ComparableField::CallInTime,
                ComparableField::Notes,
            ],
        }
    }
}

impl Settings {
    #[must_use]
    pub fn bucket_width(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.bucket_width_minutes.max(1)))
    }

    /// Fields of `left` and `right` that disagree, in configured order
    #[must_use]
    pub fn differing_fields(
        &self,
        left: &SightingRecord,
        right: &SightingRecord,
    ) -> Vec<ComparableField> {
        self.comparable_fields
            .iter()
            .copied()
            .filter(|field| !field.matches(left, right))
            .collect()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.bucket_width_minutes == 0 {
            return Err(Error::InvalidInput(
                "bucket width must be at least one minute".to_string(),
            ));
        }
        if self.comparable_fields.is_empty() {
            return Err(Error::InvalidInput(
                "at least one comparable field is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a comma separated field list such as `status,notes`
pub fn parse_comparable_fields(value: &str) -> Result<Vec<ComparableField>, Error> {
    let mut fields = Vec::new();
    for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let field = part.parse::<ComparableField>()?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }
    Ok(fields)
}

/// Inverse of [`parse_comparable_fields`]
#[must_use]
pub fn format_comparable_fields(fields: &[ComparableField]) -> String {
    fields
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

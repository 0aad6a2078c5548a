//! Race model

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

const MAX_RACE_ID_LEN: usize = 64;

/// Identifier of a race, shared by every checkpoint and the base station.
///
/// Race ids are embedded in entity and conflict ids, so they are restricted to
/// `[A-Za-z0-9_-]` and must start with an alphanumeric character.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RaceId(String);

impl RaceId {
    /// Validate and wrap a race id
    pub fn new(value: impl Into<String>) -> Result<Self, Error> {
        let value = value.into();
        let trimmed = value.trim();
        if is_valid_race_id(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(Error::InvalidInput(format!("invalid race id '{value}'")))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RaceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RaceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RaceId> for String {
    fn from(value: RaceId) -> Self {
        value.0
    }
}

fn is_valid_race_id(value: &str) -> bool {
    let re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("Invalid regex");
    value.len() <= MAX_RACE_ID_LEN && re.is_match(value)
}

/// An endurance event whose checkpoints report sightings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    pub id: RaceId,
    pub name: String,
    /// Official start; anchors time-segment boundaries
    pub start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Race {
    #[must_use]
    pub fn new(id: RaceId, name: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            start_time,
            created_at: Utc::now(),
        }
    }
}

//! Shared utility functions used across multiple modules.

use chrono::{DateTime, SubsecRound, Utc};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Convert a timestamp to the Unix milliseconds stored in the database.
pub fn to_unix_ms(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

/// Drop sub-millisecond precision, matching what the database keeps.
pub fn truncate_to_ms(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(3)
}

/// Convert stored Unix milliseconds back to a timestamp.
///
/// Out-of-range values are reported as a conversion failure on `column`.
pub fn from_unix_ms(value: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(column, value)
    })
}

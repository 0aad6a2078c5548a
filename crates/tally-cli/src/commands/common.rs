use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tally_core::matrix::AggregationMatrix;
use tally_core::models::{AuditEntry, ComparableField, Conflict, Race, TimeSegment};
use tally_core::services::DatabaseService;
use tally_core::SightingRecord;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct MatrixRow {
    pub runner: u32,
    pub cells: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MatrixItem {
    pub checkpoints: Vec<u32>,
    pub rows: Vec<MatrixRow>,
}

pub fn matrix_to_item(matrix: &AggregationMatrix) -> MatrixItem {
    MatrixItem {
        checkpoints: matrix.checkpoints.clone(),
        rows: matrix
            .runners
            .iter()
            .map(|&runner| MatrixRow {
                runner,
                cells: matrix.row(runner).iter().map(ToString::to_string).collect(),
            })
            .collect(),
    }
}

/// Accepts RFC 3339, or `YYYY-MM-DD HH:MM[:SS]` read as UTC
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, CliError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CliError::InvalidTime(value.to_string()))
}

pub fn format_timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || "-".to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

pub fn format_race_lines(races: &[Race]) -> Vec<String> {
    races
        .iter()
        .map(|race| {
            format!(
                "{:<20}  {}  {}",
                race.id.as_str(),
                race.start_time.format("%Y-%m-%d %H:%M UTC"),
                race.name
            )
        })
        .collect()
}

pub fn format_sighting_lines(records: &[SightingRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let called_in = if record.called_in { "called-in" } else { "pending" };
            let line = format!(
                "{:>6}  {:<11}  {}  {:<9}",
                record.runner_number,
                record.status.as_str(),
                format_timestamp(record.mark_off_time),
                called_in
            );
            match record.notes.as_deref() {
                Some(notes) => format!("{line}  {notes}"),
                None => line.trim_end().to_string(),
            }
        })
        .collect()
}

pub fn format_segment_lines(segments: &[TimeSegment]) -> Vec<String> {
    segments
        .iter()
        .map(|segment| {
            let runners = segment
                .runner_numbers()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let state = if segment.called_in {
                "called-in".to_string()
            } else {
                format!("{} pending", segment.pending_count())
            };
            format!("{}  {state:<10}  {runners}", segment.common_time_label)
        })
        .collect()
}

pub fn format_matrix_lines(matrix: &AggregationMatrix) -> Vec<String> {
    if matrix.is_empty() {
        return Vec::new();
    }

    let mut header = format!("{:>6}", "runner");
    for checkpoint in &matrix.checkpoints {
        header.push_str(&format!("  {:<11}", format!("cp{checkpoint}")));
    }

    let mut lines = vec![header.trim_end().to_string()];
    for &runner in &matrix.runners {
        let mut line = format!("{runner:>6}");
        for cell in matrix.row(runner) {
            line.push_str(&format!("  {:<11}", cell.to_string()));
        }
        lines.push(line.trim_end().to_string());
    }
    lines
}

pub fn format_conflict_lines(conflict: &Conflict) -> Vec<String> {
    let existing = &conflict.existing.record;
    let incoming = &conflict.incoming.record;
    let mut lines = vec![format!(
        "Conflict {}  existing@{}  incoming@{}",
        conflict.id,
        format_timestamp(Some(conflict.existing_value)),
        format_timestamp(Some(conflict.incoming_value))
    )];

    for field in &conflict.differing_fields {
        let (left, right) = match field {
            ComparableField::Status => {
                (existing.status.to_string(), incoming.status.to_string())
            }
            ComparableField::MarkOffTime => (
                format_timestamp(existing.mark_off_time),
                format_timestamp(incoming.mark_off_time),
            ),
            ComparableField::CallInTime => (
                format_timestamp(existing.call_in_time),
                format_timestamp(incoming.call_in_time),
            ),
            ComparableField::Notes => (
                existing.notes.clone().unwrap_or_else(|| "-".to_string()),
                incoming.notes.clone().unwrap_or_else(|| "-".to_string()),
            ),
            ComparableField::CalledIn => {
                (existing.called_in.to_string(), incoming.called_in.to_string())
            }
        };
        lines.push(format!(
            "  {:<13}  existing={left}  incoming={right}",
            field.as_str()
        ));
    }
    lines
}

pub fn format_audit_lines(entries: &[AuditEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "{}  {:<8}  {}  was {} @ {}",
                format_timestamp(Some(entry.recorded_at)),
                entry.action.as_str(),
                entry.previous.key(),
                entry.previous.status,
                format_timestamp(entry.previous.mark_off_time)
            )
        })
        .collect()
}

pub fn print_lines(lines: &[String], empty_message: &str) {
    if lines.is_empty() {
        println!("{empty_message}");
    }
    for line in lines {
        println!("{line}");
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("TALLY_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("tally").join("tally.db"))
        .ok_or(CliError::NoDataDir)
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}

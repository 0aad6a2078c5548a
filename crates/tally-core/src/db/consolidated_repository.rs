//! Base station consolidated record repository

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::sighting_repository::{parse_sighting, SIGHTING_COLUMNS};
use crate::error::Result;
use crate::models::{ConsolidatedRecord, RaceId, SightingKey};
use crate::util::{from_unix_ms, to_unix_ms};

/// Trait for the base station's consolidated table
pub trait ConsolidatedRepository {
    fn get(&self, key: &SightingKey) -> Result<Option<ConsolidatedRecord>>;

    /// Insert or fully replace the record at its key
    fn put(&self, record: &ConsolidatedRecord) -> Result<()>;

    /// All records of a race, ordered by checkpoint then runner
    fn query_by_race(&self, race_id: &RaceId) -> Result<Vec<ConsolidatedRecord>>;
}

/// `SQLite` implementation of `ConsolidatedRepository`
pub struct SqliteConsolidatedRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConsolidatedRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_record(row: &Row<'_>) -> rusqlite::Result<ConsolidatedRecord> {
        Ok(ConsolidatedRecord {
            record: parse_sighting(row)?,
            last_updated: from_unix_ms(row.get(8)?, 8)?,
        })
    }
}

impl ConsolidatedRepository for SqliteConsolidatedRepository<'_> {
    fn get(&self, key: &SightingKey) -> Result<Option<ConsolidatedRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SIGHTING_COLUMNS}, last_updated FROM consolidated_records
                     WHERE race_id = ?1 AND checkpoint_number = ?2 AND runner_number = ?3"
                ),
                params![key.race_id.as_str(), key.checkpoint_number, key.runner_number],
                Self::parse_record,
            )
            .optional()?;
        Ok(record)
    }

    fn put(&self, record: &ConsolidatedRecord) -> Result<()> {
        let sighting = &record.record;
        self.conn.execute(
            "INSERT INTO consolidated_records (
                race_id, checkpoint_number, runner_number, status, mark_off_time,
                call_in_time, called_in, notes, last_updated
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (race_id, checkpoint_number, runner_number) DO UPDATE SET
                status = excluded.status,
                mark_off_time = excluded.mark_off_time,
                call_in_time = excluded.call_in_time,
                called_in = excluded.called_in,
                notes = excluded.notes,
                last_updated = excluded.last_updated",
            params![
                sighting.race_id.as_str(),
                sighting.checkpoint_number,
                sighting.runner_number,
                sighting.status.as_str(),
                sighting.mark_off_time.map(to_unix_ms),
                sighting.call_in_time.map(to_unix_ms),
                sighting.called_in,
                sighting.notes,
                to_unix_ms(record.last_updated),
            ],
        )?;
        Ok(())
    }

    fn query_by_race(&self, race_id: &RaceId) -> Result<Vec<ConsolidatedRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SIGHTING_COLUMNS}, last_updated FROM consolidated_records
             WHERE race_id = ?1
             ORDER BY checkpoint_number ASC, runner_number ASC"
        ))?;
        let records = stmt
            .query_map(params![race_id.as_str()], Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

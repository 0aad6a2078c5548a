//! Checkpoint sighting repository implementation

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::audit_log::SqliteAuditLog;
use crate::error::{Error, Result};
use crate::models::{AuditAction, AuditEntry, RaceId, SightingKey, SightingRecord};
use crate::util::{from_unix_ms, to_unix_ms};

/// Columns read by [`parse_sighting`], in order
pub(crate) const SIGHTING_COLUMNS: &str =
    "race_id, checkpoint_number, runner_number, status, mark_off_time, call_in_time, called_in, notes";

/// Trait for a checkpoint's local sighting store
pub trait SightingRepository {
    /// Current (non-deleted) record for `key`
    fn get(&self, key: &SightingKey) -> Result<Option<SightingRecord>>;

    /// Create or replace the current record, archiving the value it replaces.
    ///
    /// Returns the previous current value, if any.
    fn put(&self, record: &SightingRecord) -> Result<Option<SightingRecord>>;

    /// Soft delete the current record, archiving it
    fn soft_delete(&self, key: &SightingKey) -> Result<SightingRecord>;

    /// All current records of a race, ordered by checkpoint then runner
    fn query_by_race(&self, race_id: &RaceId) -> Result<Vec<SightingRecord>>;

    /// Current records of one checkpoint, ordered by runner
    fn list_checkpoint(&self, race_id: &RaceId, checkpoint_number: u32)
        -> Result<Vec<SightingRecord>>;

    /// Flag a record as called in. Returns false when nothing changed.
    fn mark_called_in(&self, key: &SightingKey) -> Result<bool>;
}

/// `SQLite` implementation of `SightingRepository`
pub struct SqliteSightingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSightingRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SightingRepository for SqliteSightingRepository<'_> {
    fn get(&self, key: &SightingKey) -> Result<Option<SightingRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {SIGHTING_COLUMNS} FROM sightings
                     WHERE race_id = ?1 AND checkpoint_number = ?2 AND runner_number = ?3
                       AND is_deleted = 0"
                ),
                params![key.race_id.as_str(), key.checkpoint_number, key.runner_number],
                parse_sighting,
            )
            .optional()?;
        Ok(record)
    }

    fn put(&self, record: &SightingRecord) -> Result<Option<SightingRecord>> {
        let previous = self.get(&record.key())?;
        if let Some(previous) = previous.as_ref() {
            if previous == record {
                return Ok(Some(previous.clone()));
            }
            SqliteAuditLog::new(self.conn)
                .append(&AuditEntry::new(AuditAction::Updated, previous.clone()))?;
        }

        self.conn.execute(
            "INSERT INTO sightings (
                race_id, checkpoint_number, runner_number, status, mark_off_time,
                call_in_time, called_in, notes, updated_at, is_deleted
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0)
             ON CONFLICT (race_id, checkpoint_number, runner_number) DO UPDATE SET
                status = excluded.status,
                mark_off_time = excluded.mark_off_time,
                call_in_time = excluded.call_in_time,
                called_in = excluded.called_in,
                notes = excluded.notes,
                updated_at = excluded.updated_at,
                is_deleted = 0",
            params![
                record.race_id.as_str(),
                record.checkpoint_number,
                record.runner_number,
                record.status.as_str(),
                record.mark_off_time.map(to_unix_ms),
                record.call_in_time.map(to_unix_ms),
                record.called_in,
                record.notes,
                to_unix_ms(Utc::now()),
            ],
        )?;

        Ok(previous)
    }

    fn soft_delete(&self, key: &SightingKey) -> Result<SightingRecord> {
        let current = self
            .get(key)?
            .ok_or_else(|| Error::NotFound(format!("sighting {key}")))?;

        SqliteAuditLog::new(self.conn)
            .append(&AuditEntry::new(AuditAction::Deleted, current.clone()))?;

        self.conn.execute(
            "UPDATE sightings SET is_deleted = 1, updated_at = ?4
             WHERE race_id = ?1 AND checkpoint_number = ?2 AND runner_number = ?3",
            params![
                key.race_id.as_str(),
                key.checkpoint_number,
                key.runner_number,
                to_unix_ms(Utc::now())
            ],
        )?;

        Ok(current)
    }

    fn query_by_race(&self, race_id: &RaceId) -> Result<Vec<SightingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SIGHTING_COLUMNS} FROM sightings
             WHERE race_id = ?1 AND is_deleted = 0
             ORDER BY checkpoint_number ASC, runner_number ASC"
        ))?;

        let records = stmt
            .query_map(params![race_id.as_str()], parse_sighting)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn list_checkpoint(
        &self,
        race_id: &RaceId,
        checkpoint_number: u32,
    ) -> Result<Vec<SightingRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SIGHTING_COLUMNS} FROM sightings
             WHERE race_id = ?1 AND checkpoint_number = ?2 AND is_deleted = 0
             ORDER BY runner_number ASC"
        ))?;

        let records = stmt
            .query_map(params![race_id.as_str(), checkpoint_number], parse_sighting)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn mark_called_in(&self, key: &SightingKey) -> Result<bool> {
        let now = to_unix_ms(Utc::now());
        let rows = self.conn.execute(
            "UPDATE sightings
             SET called_in = 1, call_in_time = COALESCE(call_in_time, ?4), updated_at = ?4
             WHERE race_id = ?1 AND checkpoint_number = ?2 AND runner_number = ?3
               AND is_deleted = 0 AND called_in = 0",
            params![
                key.race_id.as_str(),
                key.checkpoint_number,
                key.runner_number,
                now
            ],
        )?;
        Ok(rows > 0)
    }
}

/// Parse the [`SIGHTING_COLUMNS`] prefix of a row
pub(crate) fn parse_sighting(row: &Row<'_>) -> rusqlite::Result<SightingRecord> {
    let race_id: String = row.get(0)?;
    let status: String = row.get(3)?;

    Ok(SightingRecord {
        race_id: RaceId::new(race_id).map_err(|e| conversion_error(0, e))?,
        checkpoint_number: row.get(1)?,
        runner_number: row.get(2)?,
        status: status.parse().map_err(|e| conversion_error(3, e))?,
        mark_off_time: row
            .get::<_, Option<i64>>(4)?
            .map(|ms| from_unix_ms(ms, 4))
            .transpose()?,
        call_in_time: row
            .get::<_, Option<i64>>(5)?
            .map(|ms| from_unix_ms(ms, 5))
            .transpose()?,
        called_in: row.get(6)?,
        notes: row.get(7)?,
    })
}

pub(crate) fn conversion_error(column: usize, error: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
}

//! Imported checkpoint snapshot repository

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::sighting_repository::conversion_error;
use crate::error::{Error, Result};
use crate::models::{ImportedCheckpointSnapshot, RaceId};
use crate::util::{from_unix_ms, to_unix_ms};

/// Trait for the base station's snapshot cache
pub trait SnapshotRepository {
    fn get(&self, race_id: &RaceId, checkpoint_number: u32)
        -> Result<Option<ImportedCheckpointSnapshot>>;

    /// Replace the snapshot for the snapshot's checkpoint wholesale
    fn put(&self, snapshot: &ImportedCheckpointSnapshot) -> Result<()>;

    /// Snapshots of a race ordered by checkpoint number
    fn query_by_race(&self, race_id: &RaceId) -> Result<Vec<ImportedCheckpointSnapshot>>;
}

/// `SQLite` implementation of `SnapshotRepository`; runners are kept as JSON
pub struct SqliteSnapshotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSnapshotRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_snapshot(row: &Row<'_>) -> rusqlite::Result<ImportedCheckpointSnapshot> {
        let race_id: String = row.get(0)?;
        let runners: String = row.get(3)?;
        Ok(ImportedCheckpointSnapshot {
            race_id: RaceId::new(race_id).map_err(|e| conversion_error(0, e))?,
            checkpoint_number: row.get(1)?,
            imported_at: from_unix_ms(row.get(2)?, 2)?,
            runners: serde_json::from_str(&runners)
                .map_err(|e| conversion_error(3, Error::Serialization(e)))?,
        })
    }
}

impl SnapshotRepository for SqliteSnapshotRepository<'_> {
    fn get(
        &self,
        race_id: &RaceId,
        checkpoint_number: u32,
    ) -> Result<Option<ImportedCheckpointSnapshot>> {
        let snapshot = self
            .conn
            .query_row(
                "SELECT race_id, checkpoint_number, imported_at, runners FROM imported_snapshots
                 WHERE race_id = ?1 AND checkpoint_number = ?2",
                params![race_id.as_str(), checkpoint_number],
                Self::parse_snapshot,
            )
            .optional()?;
        Ok(snapshot)
    }

    fn put(&self, snapshot: &ImportedCheckpointSnapshot) -> Result<()> {
        let runners = serde_json::to_string(&snapshot.runners)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO imported_snapshots (race_id, checkpoint_number, imported_at, runners)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                snapshot.race_id.as_str(),
                snapshot.checkpoint_number,
                to_unix_ms(snapshot.imported_at),
                runners
            ],
        )?;
        Ok(())
    }

    fn query_by_race(&self, race_id: &RaceId) -> Result<Vec<ImportedCheckpointSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT race_id, checkpoint_number, imported_at, runners FROM imported_snapshots
             WHERE race_id = ?1
             ORDER BY checkpoint_number ASC",
        )?;
        let snapshots = stmt
            .query_map(params![race_id.as_str()], Self::parse_snapshot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snapshots)
    }
}

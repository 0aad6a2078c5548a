//! Append-only audit trail of replaced sighting values

use rusqlite::{params, Connection};

use super::sighting_repository::conversion_error;
use crate::error::{Error, Result};
use crate::models::{AuditEntry, RaceId};
use crate::util::{from_unix_ms, to_unix_ms};

/// Writer and reader for the `sighting_audit` table.
///
/// Entries are only ever inserted; nothing updates or deletes them.
pub struct SqliteAuditLog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteAuditLog<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        let previous = serde_json::to_string(&entry.previous)?;
        self.conn.execute(
            "INSERT INTO sighting_audit (
                id, race_id, checkpoint_number, runner_number, action, previous, recorded_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id.to_string(),
                entry.previous.race_id.as_str(),
                entry.previous.checkpoint_number,
                entry.previous.runner_number,
                entry.action.as_str(),
                previous,
                to_unix_ms(entry.recorded_at),
            ],
        )?;
        tracing::debug!(
            "Archived {} value of {}",
            entry.action.as_str(),
            entry.previous.key()
        );
        Ok(())
    }

    /// Newest-first entries for a race
    pub fn list(&self, race_id: &RaceId, limit: usize) -> Result<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, action, previous, recorded_at FROM sighting_audit
             WHERE race_id = ?1
             ORDER BY recorded_at DESC, id DESC
             LIMIT ?2",
        )?;

        let entries = stmt
            .query_map(params![race_id.as_str(), limit], |row| {
                let id: String = row.get(0)?;
                let action: String = row.get(1)?;
                let previous: String = row.get(2)?;
                Ok(AuditEntry {
                    id: id.parse().map_err(|_| {
                        conversion_error(0, Error::InvalidInput(format!("invalid audit id '{id}'")))
                    })?,
                    action: action.parse().map_err(|e| conversion_error(1, e))?,
                    previous: serde_json::from_str(&previous)
                        .map_err(|e| conversion_error(2, Error::Serialization(e)))?,
                    recorded_at: from_unix_ms(row.get(3)?, 3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{AuditAction, SightingRecord};

    #[test]
    fn list_is_newest_first_and_scoped_to_race() {
        let db = Database::open_in_memory().unwrap();
        let log = SqliteAuditLog::new(db.connection());
        let race = RaceId::new("r1").unwrap();

        let mut first = AuditEntry::new(AuditAction::Updated, SightingRecord::new(race.clone(), 1, 1));
        first.recorded_at -= chrono::Duration::seconds(10);
        let second = AuditEntry::new(AuditAction::Resolved, SightingRecord::new(race.clone(), 1, 2));
        let other = AuditEntry::new(
            AuditAction::Deleted,
            SightingRecord::new(RaceId::new("r2").unwrap(), 1, 1),
        );

        log.append(&first).unwrap();
        log.append(&second).unwrap();
        log.append(&other).unwrap();

        let entries = log.list(&race, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Resolved);
        assert_eq!(entries[1].previous.runner_number, 1);

        assert_eq!(log.list(&race, 1).unwrap().len(), 1);
    }
}

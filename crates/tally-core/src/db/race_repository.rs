//! Race repository implementation

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::sighting_repository::conversion_error;
use crate::error::{Error, Result};
use crate::models::{Race, RaceId};
use crate::util::{from_unix_ms, to_unix_ms};

/// Trait for race storage operations
pub trait RaceRepository {
    /// Store a new race; fails if the id is taken
    fn create(&self, race: &Race) -> Result<()>;

    /// Get a race by id
    fn get(&self, id: &RaceId) -> Result<Option<Race>>;

    /// List races, most recent start first
    fn list(&self) -> Result<Vec<Race>>;
}

/// `SQLite` implementation of `RaceRepository`
pub struct SqliteRaceRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRaceRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_race(row: &Row<'_>) -> rusqlite::Result<Race> {
        let id: String = row.get(0)?;
        Ok(Race {
            id: RaceId::new(id).map_err(|e| conversion_error(0, e))?,
            name: row.get(1)?,
            start_time: from_unix_ms(row.get(2)?, 2)?,
            created_at: from_unix_ms(row.get(3)?, 3)?,
        })
    }
}

impl RaceRepository for SqliteRaceRepository<'_> {
    fn create(&self, race: &Race) -> Result<()> {
        if self.get(&race.id)?.is_some() {
            return Err(Error::InvalidInput(format!(
                "race '{}' already exists",
                race.id
            )));
        }

        self.conn.execute(
            "INSERT INTO races (id, name, start_time, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                race.id.as_str(),
                race.name,
                to_unix_ms(race.start_time),
                to_unix_ms(race.created_at)
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &RaceId) -> Result<Option<Race>> {
        let race = self
            .conn
            .query_row(
                "SELECT id, name, start_time, created_at FROM races WHERE id = ?1",
                params![id.as_str()],
                Self::parse_race,
            )
            .optional()?;
        Ok(race)
    }

    fn list(&self) -> Result<Vec<Race>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, start_time, created_at FROM races ORDER BY start_time DESC, id ASC",
        )?;
        let races = stmt
            .query_map([], Self::parse_race)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(races)
    }
}

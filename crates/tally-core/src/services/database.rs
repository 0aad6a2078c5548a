//! Shared database service wrapper used by the checkpoint and base station.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};

use crate::db::{
    Database, RaceRepository, SettingsRepository, SqliteRaceRepository, SqliteSettingsRepository,
};
use crate::error::{Error, Result};
use crate::models::{Race, RaceId, Settings};
use crate::util::truncate_to_ms;

/// Thread-safe handle to one store.
///
/// Every operation takes the same async mutex, so a store only ever sees one
/// writer and a reconcile can never interleave with another write.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let path = db_path.clone();
        let db = tokio::task::spawn_blocking(move || Database::open(&path))
            .await
            .map_err(|error| Error::Io(std::io::Error::other(error)))??;
        tracing::info!("Using store at {}", db_path.display());

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    /// Register a new race.
    pub async fn create_race(
        &self,
        id: RaceId,
        name: &str,
        start_time: DateTime<Utc>,
    ) -> Result<Race> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("race name cannot be empty".to_string()));
        }

        let race = Race::new(id, name, truncate_to_ms(start_time));
        let db = self.lock().await;
        SqliteRaceRepository::new(db.connection()).create(&race)?;
        tracing::info!("Created race '{}'", race.id);
        Ok(race)
    }

    /// Fetch a race by id.
    pub async fn get_race(&self, id: &RaceId) -> Result<Option<Race>> {
        let db = self.lock().await;
        SqliteRaceRepository::new(db.connection()).get(id)
    }

    /// List races, latest start first.
    pub async fn list_races(&self) -> Result<Vec<Race>> {
        let db = self.lock().await;
        SqliteRaceRepository::new(db.connection()).list()
    }

    /// Load settings.
    pub async fn load_settings(&self) -> Result<Settings> {
        let db = self.lock().await;
        SqliteSettingsRepository::new(db.connection()).load()
    }

    /// Save settings.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let db = self.lock().await;
        SqliteSettingsRepository::new(db.connection()).save(settings)
    }
}

/// Look up a race or fail with `NotFound`
pub(crate) fn require_race(db: &Database, id: &RaceId) -> Result<Race> {
    SqliteRaceRepository::new(db.connection())
        .get(id)?
        .ok_or_else(|| Error::NotFound(format!("race '{id}'")))
}

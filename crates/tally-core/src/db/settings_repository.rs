//! Settings repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{format_comparable_fields, parse_comparable_fields, Settings};

/// Trait for settings storage operations
pub trait SettingsRepository {
    /// Load settings from the database
    fn load(&self) -> Result<Settings>;

    /// Save settings to the database
    fn save(&self, settings: &Settings) -> Result<()>;
}

/// `SQLite` implementation of `SettingsRepository`
pub struct SqliteSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        // Unparseable values fall back to defaults rather than failing the load
        if let Some(value) = self.get_setting("bucket_width_minutes")? {
            match value.trim().parse::<u32>() {
                Ok(minutes) if minutes > 0 => settings.bucket_width_minutes = minutes,
                _ => tracing::warn!("Ignoring invalid bucket_width_minutes setting '{value}'"),
            }
        }

        if let Some(value) = self.get_setting("comparable_fields")? {
            match parse_comparable_fields(&value) {
                Ok(fields) if !fields.is_empty() => settings.comparable_fields = fields,
                _ => tracing::warn!("Ignoring invalid comparable_fields setting '{value}'"),
            }
        }

        Ok(settings)
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        self.set_setting(
            "bucket_width_minutes",
            &settings.bucket_width_minutes.to_string(),
        )?;
        self.set_setting(
            "comparable_fields",
            &format_comparable_fields(&settings.comparable_fields),
        )?;
        Ok(())
    }
}

impl SqliteSettingsRepository<'_> {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

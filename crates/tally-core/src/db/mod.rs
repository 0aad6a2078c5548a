//! Database layer for Tally

mod audit_log;
mod connection;
mod consolidated_repository;
mod migrations;
mod race_repository;
mod settings_repository;
mod sighting_repository;
mod snapshot_repository;

pub use audit_log::SqliteAuditLog;
pub use connection::Database;
pub use consolidated_repository::{ConsolidatedRepository, SqliteConsolidatedRepository};
pub use race_repository::{RaceRepository, SqliteRaceRepository};
pub use settings_repository::{SettingsRepository, SqliteSettingsRepository};
pub use sighting_repository::{SightingRepository, SqliteSightingRepository};
pub use snapshot_repository::{SnapshotRepository, SqliteSnapshotRepository};

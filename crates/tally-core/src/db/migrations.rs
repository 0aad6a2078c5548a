//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Apply `statements` atomically
fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", [])?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, []) {
            conn.execute("ROLLBACK", []).ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", []) {
        conn.execute("ROLLBACK", []).ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: races and the checkpoint's local store
fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS races (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS sightings (
                race_id TEXT NOT NULL,
                checkpoint_number INTEGER NOT NULL,
                runner_number INTEGER NOT NULL,
                status TEXT NOT NULL,
                mark_off_time INTEGER,
                call_in_time INTEGER,
                called_in INTEGER NOT NULL DEFAULT 0,
                notes TEXT,
                updated_at INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (race_id, checkpoint_number, runner_number)
            )",
            "CREATE INDEX IF NOT EXISTS idx_sightings_race ON sightings(race_id, checkpoint_number)",
            "CREATE TABLE IF NOT EXISTS sighting_audit (
                id TEXT PRIMARY KEY,
                race_id TEXT NOT NULL,
                checkpoint_number INTEGER NOT NULL,
                runner_number INTEGER NOT NULL,
                action TEXT NOT NULL,
                previous TEXT NOT NULL,
                recorded_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_sighting_audit_race ON sighting_audit(race_id, recorded_at DESC)",
            "INSERT INTO schema_version (version) VALUES (1)",
        ],
    )?;

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: base station consolidated records and snapshots
fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS consolidated_records (
                race_id TEXT NOT NULL,
                checkpoint_number INTEGER NOT NULL,
                runner_number INTEGER NOT NULL,
                status TEXT NOT NULL,
                mark_off_time INTEGER,
                call_in_time INTEGER,
                called_in INTEGER NOT NULL DEFAULT 0,
                notes TEXT,
                last_updated INTEGER NOT NULL,
                PRIMARY KEY (race_id, checkpoint_number, runner_number)
            )",
            "CREATE TABLE IF NOT EXISTS imported_snapshots (
                race_id TEXT NOT NULL,
                checkpoint_number INTEGER NOT NULL,
                imported_at INTEGER NOT NULL,
                runners TEXT NOT NULL,
                PRIMARY KEY (race_id, checkpoint_number)
            )",
            "INSERT INTO schema_version (version) VALUES (2)",
        ],
    )?;

    tracing::info!("Migrated database to version 2");
    Ok(())
}

/// Migration to version 3: engine settings
fn migrate_v3(conn: &Connection) -> Result<()> {
    apply(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            "INSERT INTO schema_version (version) VALUES (3)",
        ],
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_migrations() {
        let conn = setup();
        run(&conn).unwrap();

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = setup();
        run(&conn).unwrap();
        run(&conn).unwrap(); // Should not fail

        let version = get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migrations_create_store_tables() {
        let conn = setup();
        run(&conn).unwrap();

        for table in [
            "races",
            "sightings",
            "sighting_audit",
            "consolidated_records",
            "imported_snapshots",
            "settings",
        ] {
            assert!(table_exists(&conn, table), "missing table {table}");
        }
    }
}

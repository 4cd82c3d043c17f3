// Database migrations for voice-rating
// Creates and updates the database schema

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Run all necessary migrations to bring the database up to date
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to inspect sqlite_master")?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .context("Failed to read schema version")?;

    Ok(version.unwrap_or(0))
}

/// Initial schema creation (version 1)
fn migrate_v1(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v1");

    conn.execute_batch(
        r#"
        BEGIN;

        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Ratings table: one row per rated clip, duplicates allowed
        CREATE TABLE IF NOT EXISTS ratings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            voice_id TEXT NOT NULL,
            original_transcription TEXT,
            edited_transcription TEXT,
            transcription_changed INTEGER DEFAULT 0,
            noise_rating INTEGER,
            naturalness_rating INTEGER,
            pronunciation_rating INTEGER,
            username TEXT,
            timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        INSERT INTO schema_version (version) VALUES (1);

        COMMIT;
        "#,
    )
    .context("Failed to run migration v1")?;

    Ok(())
}

/// Lookup indexes for per-clip and per-rater queries (version 2)
fn migrate_v2(conn: &Connection) -> Result<()> {
    log::info!("Running database migration v2");

    conn.execute_batch(
        r#"
        BEGIN;

        CREATE INDEX IF NOT EXISTS idx_ratings_voice_id ON ratings(voice_id);
        CREATE INDEX IF NOT EXISTS idx_ratings_username ON ratings(username);

        INSERT INTO schema_version (version) VALUES (2);

        COMMIT;
        "#,
    )
    .context("Failed to run migration v2")?;

    Ok(())
}

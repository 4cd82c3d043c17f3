// Ratings repository for voice-rating
// Transactional writer for batch submissions plus read helpers for stored ratings

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row, Statement};

use super::models::{NewRating, RatingSubmission, StoredRating};
use super::DatabaseManager;
use crate::ratings::{BatchCoordinator, RatingStore, StoreError, SubmissionReceipt, SubmitError};

const INSERT_RATING_SQL: &str = r#"
    INSERT INTO ratings (
        voice_id, original_transcription, edited_transcription, transcription_changed,
        noise_rating, naturalness_rating, pronunciation_rating, username
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

const SELECT_RATING_COLUMNS: &str = r#"
    SELECT id, voice_id, original_transcription, edited_transcription, transcription_changed,
           noise_rating, naturalness_rating, pronunciation_rating, username, timestamp
    FROM ratings
"#;

/// [`RatingStore`] over one SQLite connection.
///
/// Uses `BEGIN IMMEDIATE` so the write lock is taken when the batch starts
/// rather than on the first insert.
pub struct SqliteRatingWriter<'c> {
    conn: &'c Connection,
    stmt: Option<Statement<'c>>,
    in_transaction: bool,
}

impl<'c> SqliteRatingWriter<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            stmt: None,
            in_transaction: false,
        }
    }
}

impl RatingStore for SqliteRatingWriter<'_> {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.in_transaction {
            return Err(StoreError::Other("transaction already open".to_string()));
        }

        let conn = self.conn;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;

        match conn.prepare(INSERT_RATING_SQL) {
            Ok(stmt) => {
                self.stmt = Some(stmt);
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    log::error!("Rollback after failed prepare also failed: {}", rollback);
                }
                self.in_transaction = false;
                Err(e.into())
            }
        }
    }

    fn insert(&mut self, rating: &NewRating) -> Result<i64, StoreError> {
        let stmt = self.stmt.as_mut().ok_or(StoreError::NoTransaction)?;

        let row_id = stmt.insert(params![
            rating.voice_id,
            rating.original_transcription,
            rating.edited_transcription,
            rating.transcription_changed as i32,
            rating.noise_rating,
            rating.naturalness_rating,
            rating.pronunciation_rating,
            rating.username,
        ])?;

        Ok(row_id)
    }

    fn finalize(&mut self) -> Result<(), StoreError> {
        match self.stmt.take() {
            Some(stmt) => stmt.finalize().map_err(StoreError::from),
            None => Ok(()),
        }
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if !self.in_transaction {
            return Err(StoreError::NoTransaction);
        }
        self.stmt = None;

        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.stmt = None;

        // A failed COMMIT can already have ended the transaction
        if self.conn.is_autocommit() {
            self.in_transaction = false;
            return Ok(());
        }

        self.conn.execute_batch("ROLLBACK")?;
        self.in_transaction = false;
        Ok(())
    }
}

impl Drop for SqliteRatingWriter<'_> {
    fn drop(&mut self) {
        self.stmt = None;
        if self.in_transaction && !self.conn.is_autocommit() {
            log::warn!("Rating writer dropped with an open transaction, rolling back");
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                log::error!("Rollback on drop failed: {}", e);
            }
        }
    }
}

impl DatabaseManager {
    /// Persist a batch of ratings atomically.
    ///
    /// The connection guard is held from BEGIN to COMMIT/ROLLBACK, so
    /// concurrent submissions run one after another.
    pub fn submit_ratings(
        &self,
        coordinator: &BatchCoordinator,
        batch: &[RatingSubmission],
    ) -> std::result::Result<SubmissionReceipt, SubmitError> {
        if batch.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        let conn = self
            .lock_connection()
            .map_err(|source| SubmitError::Begin { source })?;
        let mut writer = SqliteRatingWriter::new(&conn);
        coordinator.submit(&mut writer, batch)
    }

    /// Total number of stored ratings
    pub fn count_ratings(&self) -> Result<i64> {
        self.with_connection(count_ratings_impl)
    }

    /// Stored ratings, newest first
    pub fn list_ratings(&self, limit: Option<usize>) -> Result<Vec<StoredRating>> {
        self.with_connection(|conn| list_ratings_impl(conn, limit))
    }

    /// All ratings recorded for one clip, oldest first
    pub fn ratings_for_voice(&self, voice_id: &str) -> Result<Vec<StoredRating>> {
        self.with_connection(|conn| ratings_for_voice_impl(conn, voice_id))
    }
}

fn row_to_rating(row: &Row<'_>) -> rusqlite::Result<StoredRating> {
    Ok(StoredRating {
        id: row.get(0)?,
        voice_id: row.get(1)?,
        original_transcription: row.get(2)?,
        edited_transcription: row.get(3)?,
        transcription_changed: row.get::<_, Option<i64>>(4)?.map_or(false, |v| v != 0),
        noise_rating: row.get(5)?,
        naturalness_rating: row.get(6)?,
        pronunciation_rating: row.get(7)?,
        username: row.get(8)?,
        timestamp: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
    })
}

fn count_ratings_impl(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM ratings", [], |row| row.get(0))
        .context("Failed to count ratings")
}

fn list_ratings_impl(conn: &Connection, limit: Option<usize>) -> Result<Vec<StoredRating>> {
    let sql = format!("{} ORDER BY id DESC LIMIT ?", SELECT_RATING_COLUMNS);
    let mut stmt = conn.prepare(&sql)
        .context("Failed to prepare list_ratings query")?;

    // SQLite treats a negative LIMIT as unbounded
    let limit = limit.map_or(-1, |l| l as i64);
    let ratings = stmt.query_map(params![limit], row_to_rating)
        .context("Failed to query ratings")?;

    ratings.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect ratings")
}

fn ratings_for_voice_impl(conn: &Connection, voice_id: &str) -> Result<Vec<StoredRating>> {
    let sql = format!("{} WHERE voice_id = ? ORDER BY id ASC", SELECT_RATING_COLUMNS);
    let mut stmt = conn.prepare(&sql)
        .context("Failed to prepare ratings_for_voice query")?;

    let ratings = stmt.query_map(params![voice_id], row_to_rating)
        .context("Failed to query ratings for voice")?;

    ratings.collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect ratings for voice")
}

// Database module for voice-rating
// Provides SQLite persistence for submitted ratings

pub mod manager;
pub mod migrations;
pub mod models;
pub mod ratings_repo;

pub use manager::DatabaseManager;
pub use models::*;
pub use ratings_repo::SqliteRatingWriter;

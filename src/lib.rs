// voice-rating - human quality ratings for sampled voice clips
//
// - dataset: clip index loaded once at startup, random sampling without replacement
// - ratings: per-item validation and all-or-nothing batch submission
// - database: SQLite persistence for ratings
// - auth: login and export gates
// - commands / rpc: request handlers and the JSON-RPC transport

pub mod auth;
pub mod commands;
pub mod config;
pub mod database;
pub mod dataset;
pub mod ratings;
pub mod rpc;
pub mod state;

pub use config::AppConfig;
pub use state::AppState;

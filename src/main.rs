//! voice-rating service binary
//!
//! Loads the dataset index and opens the ratings database once, then serves
//! line-delimited JSON-RPC requests on stdin/stdout. Logs go to stderr.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use voice_rating::config::AppConfig;
use voice_rating::rpc;
use voice_rating::state::AppState;

async fn run() -> Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    log::info!("Database file: {}", config.database_path.display());

    let state = Arc::new(AppState::initialize(config).await?);
    log::info!(
        "voice-rating ready: {} dataset entries, {} rating(s) stored",
        state.sampler().population(),
        state.db().count_ratings().unwrap_or(-1)
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = rpc::handle_line(Arc::clone(&state), &line).await;
        let encoded = serde_json::to_string(&response).context("Failed to encode response")?;

        let mut handle = io::stdout().lock();
        writeln!(handle, "{}", encoded).context("Failed to write response")?;
        handle.flush().context("Failed to flush stdout")?;
    }

    log::info!("Input closed, shutting down");
    Ok(())
}

#[tokio::main]
async fn main() {
    // stdout carries the protocol, so logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run().await {
        log::error!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}

//! Application configuration loaded from environment variables

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::dataset::DatasetSource;
use crate::ratings::{DEFAULT_RATING_BOUNDS, DEFAULT_SUBMIT_TIMEOUT};

/// Common Voice 17 Thai test split transcript index
pub const DEFAULT_DATASET_URL: &str = "https://huggingface.co/datasets/mozilla-foundation/common_voice_17_0/resolve/main/transcript/th/test.tsv?download=true";

/// Number of clips served per `voices` request
pub const DEFAULT_NUM_SAMPLES: usize = 5;

pub const DEFAULT_ADMIN_USER: &str = "admin";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub dataset: DatasetSource,
    pub num_samples: usize,
    pub admin_user: String,
    pub admin_password: Option<String>,
    /// `None` disables the score range check
    pub rating_bounds: Option<RangeInclusive<i64>>,
    pub submit_timeout: Option<Duration>,
    /// Exit at startup when the dataset index comes up empty
    pub require_dataset: bool,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    ///
    /// Recognised variables:
    /// - `VOICE_RATING_DB`: database file (default `<data dir>/voice-rating/database.db`)
    /// - `VOICE_RATING_DATASET`: TSV path or http(s) URL
    /// - `HF_TOKEN`: bearer token used when fetching the dataset
    /// - `VOICE_RATING_NUM_SAMPLES`: clips per request (default 5)
    /// - `VOICE_RATING_ADMIN_USER` / `VOICE_RATING_ADMIN_PASSWORD`: login and export credentials
    /// - `VOICE_RATING_RATING_MIN` / `VOICE_RATING_RATING_MAX`: score bounds (default 1 / 5)
    /// - `VOICE_RATING_RATING_BOUNDS=off`: disable the score range check
    /// - `VOICE_RATING_SUBMIT_TIMEOUT_MS`: transaction limit, `0` disables (default 10000)
    /// - `VOICE_RATING_REQUIRE_DATASET`: `true` to refuse to start without entries
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_path = match var("VOICE_RATING_DB") {
            Some(path) => PathBuf::from(path),
            None => default_database_path(),
        };

        let dataset_location = var("VOICE_RATING_DATASET").unwrap_or_else(|| DEFAULT_DATASET_URL.to_string());
        let dataset = DatasetSource::parse(&dataset_location, var("HF_TOKEN"));

        let num_samples = parse_or("VOICE_RATING_NUM_SAMPLES", var("VOICE_RATING_NUM_SAMPLES"), DEFAULT_NUM_SAMPLES)?;

        let rating_bounds = match var("VOICE_RATING_RATING_BOUNDS").as_deref() {
            Some("off") | Some("none") | Some("false") => None,
            _ => {
                let min = parse_or("VOICE_RATING_RATING_MIN", var("VOICE_RATING_RATING_MIN"), *DEFAULT_RATING_BOUNDS.start())?;
                let max = parse_or("VOICE_RATING_RATING_MAX", var("VOICE_RATING_RATING_MAX"), *DEFAULT_RATING_BOUNDS.end())?;
                if min > max {
                    return Err(anyhow!("Rating bounds are inverted: min {} > max {}", min, max));
                }
                Some(min..=max)
            }
        };

        let default_timeout_ms = DEFAULT_SUBMIT_TIMEOUT.as_millis() as u64;
        let submit_timeout = match parse_or("VOICE_RATING_SUBMIT_TIMEOUT_MS", var("VOICE_RATING_SUBMIT_TIMEOUT_MS"), default_timeout_ms)? {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let require_dataset = parse_or("VOICE_RATING_REQUIRE_DATASET", var("VOICE_RATING_REQUIRE_DATASET"), false)?;

        Ok(Self {
            database_path,
            dataset,
            num_samples,
            admin_user: var("VOICE_RATING_ADMIN_USER").unwrap_or_else(|| DEFAULT_ADMIN_USER.to_string()),
            admin_password: var("VOICE_RATING_ADMIN_PASSWORD"),
            rating_bounds,
            submit_timeout,
            require_dataset,
        })
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voice-rating")
        .join("database.db")
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

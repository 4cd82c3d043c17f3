// Dataset source - where the TSV index comes from
use std::fmt;
use std::path::PathBuf;

use reqwest::Client;

use super::{DatasetIndex, LoadError};

/// Longest slice of an error response body kept for diagnostics
const ERROR_BODY_EXCERPT: usize = 512;

#[derive(Clone, PartialEq, Eq)]
pub enum DatasetSource {
    File(PathBuf),
    Url { url: String, token: Option<String> },
}

impl fmt::Debug for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::File(path) => f.debug_tuple("File").field(path).finish(),
            DatasetSource::Url { url, token } => f
                .debug_struct("Url")
                .field("url", url)
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

impl DatasetSource {
    /// `http://` and `https://` locations are fetched, anything else is a file path
    pub fn parse(location: &str, token: Option<String>) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            DatasetSource::Url {
                url: location.to_string(),
                token,
            }
        } else {
            DatasetSource::File(PathBuf::from(location))
        }
    }

    /// Read the raw TSV text
    pub async fn fetch_text(&self) -> Result<String, LoadError> {
        match self {
            DatasetSource::File(path) => {
                log::info!("Reading dataset index from: {}", path.display());
                tokio::fs::read_to_string(path).await.map_err(|source| LoadError::Read {
                    path: path.clone(),
                    source,
                })
            }
            DatasetSource::Url { url, token } => fetch_url(url, token.as_deref()).await,
        }
    }

    /// Fetch and parse, degrading to an empty index on any failure
    pub async fn load(&self) -> (DatasetIndex, Option<LoadError>) {
        match self.fetch_text().await {
            Ok(text) => {
                log::info!("Dataset text fetched ({} bytes). Parsing...", text.len());
                DatasetIndex::load(&text)
            }
            Err(e) => {
                log::error!("Failed to load dataset from {:?}: {}", self, e);
                (DatasetIndex::empty(), Some(e))
            }
        }
    }
}

async fn fetch_url(url: &str, token: Option<&str>) -> Result<String, LoadError> {
    log::info!("Fetching dataset index from: {}", url);
    if token.is_none() {
        log::warn!("No access token configured. Fetch will fail if the dataset requires auth.");
    }

    let client = Client::new();
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|e| LoadError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error body.".to_string());
        let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
        return Err(LoadError::Fetch {
            url: url.to_string(),
            reason: format!("status {}: {}", status, excerpt),
        });
    }

    response.text().await.map_err(|e| LoadError::Fetch {
        url: url.to_string(),
        reason: format!("failed to read body: {}", e),
    })
}

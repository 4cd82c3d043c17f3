//! Request handlers for the rating service
//!
//! Each handler takes the shared [`AppState`] and returns a serializable
//! response or a [`ServiceError`] that knows its HTTP-style status code, so any
//! transport can render it.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{self, AuthError, ExportError};
use crate::database::RatingSubmission;
use crate::dataset::DatasetEntry;
use crate::ratings::{FailureClass, ItemError, RollbackCause, StoreError, SubmitError};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Dataset not loaded or empty. Check server logs.")]
    DatasetUnavailable,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status(&self) -> u16 {
        match self {
            ServiceError::DatasetUnavailable => 503,
            ServiceError::InvalidRequest(_) => 400,
            ServiceError::Submit(e) => match e.class() {
                FailureClass::EmptyBatch | FailureClass::Rejected => 400,
                FailureClass::Timeout => 504,
                FailureClass::Begin | FailureClass::Commit | FailureClass::Rollback => 500,
            },
            ServiceError::Auth(_) => 401,
            ServiceError::Export(ExportError::NotFound(_)) => 404,
            ServiceError::Export(ExportError::PermissionDenied(_)) => 403,
            ServiceError::Export(ExportError::Io { .. }) => 500,
            ServiceError::Store(_) | ServiceError::Internal(_) => 500,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let (class, errors, rollback_error) = match self {
            ServiceError::Submit(e) => {
                let rollback_error = match e {
                    SubmitError::RollbackFailed { rollback, .. } => Some(rollback.to_string()),
                    _ => None,
                };
                (Some(e.class()), e.item_errors().to_vec(), rollback_error)
            }
            _ => (None, Vec::new(), None),
        };

        ErrorResponse {
            status: self.status(),
            message: self.to_string(),
            class,
            errors,
            rollback_error,
        }
    }
}

/// Body returned for any failed request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<FailureClass>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ItemError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
    pub count: usize,
    pub batch_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub password: String,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResponse {
    pub destination: PathBuf,
    pub bytes: u64,
}

/// Random clips to rate, `num_samples` at a time
pub async fn get_voices(state: &AppState) -> Result<Vec<DatasetEntry>, ServiceError> {
    let sampler = state.sampler();
    if sampler.population() == 0 {
        log::error!("No dataset entries loaded in memory.");
        return Err(ServiceError::DatasetUnavailable);
    }

    let voices = sampler.sample(state.config().num_samples);
    log::info!("Sending {} voice samples.", voices.len());
    Ok(voices)
}

/// Store a batch of ratings, all or nothing
pub async fn submit_ratings(
    state: Arc<AppState>,
    batch: Vec<RatingSubmission>,
) -> Result<SubmitResponse, ServiceError> {
    if batch.is_empty() {
        return Err(SubmitError::EmptyBatch.into());
    }

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        worker_state.db().submit_ratings(worker_state.coordinator(), &batch)
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("submission task failed: {}", e)))?;

    match result {
        Ok(receipt) => Ok(SubmitResponse {
            message: format!("Successfully submitted {} ratings.", receipt.count),
            count: receipt.count,
            batch_id: receipt.batch_id,
        }),
        Err(e) => {
            if let SubmitError::RollbackFailed { cause: RollbackCause::Commit(commit), rollback } = &e {
                log::error!(
                    "Store may be inconsistent: commit failed ({}) and rollback failed ({})",
                    commit,
                    rollback
                );
            }
            Err(e.into())
        }
    }
}

pub async fn login(state: &AppState, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
    log::info!("Received login attempt for user: {}", request.username);
    state.login_gate().login(&request.username, &request.password)?;
    Ok(LoginResponse {
        success: true,
        username: request.username,
    })
}

/// Stream the database file to `destination` once the admin password checks out
pub async fn download_db(state: Arc<AppState>, request: ExportRequest) -> Result<ExportResponse, ServiceError> {
    state.export_gate().check(&request.password)?;
    log::info!("Admin password accepted. Exporting database to {}", request.destination.display());

    let worker_state = Arc::clone(&state);
    let destination = request.destination.clone();
    tokio::task::spawn_blocking(move || -> Result<u64, ServiceError> {
        // Hold the connection so no batch is mid-transaction while copying
        let _conn = worker_state.db().lock_connection()?;
        let source = worker_state.db().db_path();

        let mut out = std::fs::File::create(&destination).map_err(|e| {
            ServiceError::Internal(format!("cannot create {}: {}", destination.display(), e))
        })?;
        Ok(auth::stream_export(source, &mut out)?)
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("export task failed: {}", e)))?
    .map(|bytes| ExportResponse {
        destination: request.destination,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::DatabaseManager;
    use crate::dataset::DatasetIndex;
    use std::collections::HashSet;
    use tempfile::{tempdir, TempDir};

    fn create_state(entries: Vec<DatasetEntry>) -> (TempDir, Arc<AppState>) {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.database_path = dir.path().join("database.db");
        config.admin_password = Some("admin123".to_string());

        let db = DatabaseManager::new(config.database_path.clone()).unwrap();
        let state = AppState::new(config, DatasetIndex::from_entries(entries), db);
        (dir, Arc::new(state))
    }

    fn valid_rating(voice_id: &str) -> RatingSubmission {
        RatingSubmission {
            voice_id: Some(voice_id.to_string()),
            original_transcription: Some("hi".to_string()),
            edited_transcription: Some("hi".to_string()),
            noise_rating: Some(1),
            naturalness_rating: Some(1),
            pronunciation_rating: Some(1),
            username: Some("admin".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_voices_clamps_to_population() {
        let (_dir, state) = create_state(vec![
            DatasetEntry::new("a", "hello"),
            DatasetEntry::new("b", "world"),
        ]);

        let voices = get_voices(&state).await.unwrap();
        let ids: HashSet<&str> = voices.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, HashSet::from(["a", "b"]));
    }

    #[tokio::test]
    async fn test_get_voices_on_empty_dataset_is_unavailable() {
        let (_dir, state) = create_state(Vec::new());
        let err = get_voices(&state).await.unwrap_err();
        assert_eq!(err.status(), 503);
    }

    #[tokio::test]
    async fn test_submit_success_and_rejection() {
        let (_dir, state) = create_state(Vec::new());

        let ok = submit_ratings(Arc::clone(&state), vec![valid_rating("a")]).await.unwrap();
        assert_eq!(ok.count, 1);
        assert_eq!(ok.message, "Successfully submitted 1 ratings.");

        let mut invalid = valid_rating("b");
        invalid.noise_rating = None;
        let err = submit_ratings(Arc::clone(&state), vec![valid_rating("c"), invalid]).await.unwrap_err();
        let response = err.to_response();
        assert_eq!(response.status, 400);
        assert_eq!(response.class, Some(FailureClass::Rejected));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].index, Some(1));

        assert_eq!(state.db().count_ratings().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_submission_is_bad_request() {
        let (_dir, state) = create_state(Vec::new());
        let err = submit_ratings(state, Vec::new()).await.unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_response().class, Some(FailureClass::EmptyBatch));
    }

    #[tokio::test]
    async fn test_login() {
        let (_dir, state) = create_state(Vec::new());
        let ok = login(&state, LoginRequest { username: "admin".into(), password: "admin123".into() })
            .await
            .unwrap();
        assert!(ok.success);

        let err = login(&state, LoginRequest { username: "admin".into(), password: "nope".into() })
            .await
            .unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[tokio::test]
    async fn test_download_db_requires_password() {
        let (dir, state) = create_state(Vec::new());
        submit_ratings(Arc::clone(&state), vec![valid_rating("a")]).await.unwrap();

        let destination = dir.path().join("export.db");
        let err = download_db(
            Arc::clone(&state),
            ExportRequest { password: "wrong".into(), destination: destination.clone() },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), 401);
        assert!(!destination.exists());

        let exported = download_db(
            Arc::clone(&state),
            ExportRequest { password: "admin123".into(), destination: destination.clone() },
        )
        .await
        .unwrap();
        assert!(exported.bytes > 0);

        let copy = DatabaseManager::new(destination).unwrap();
        assert_eq!(copy.count_ratings().unwrap(), 1);
    }
}

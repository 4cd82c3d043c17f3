use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use super::validator::FieldProblem;

/// Failure reported by the underlying row store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection lock poisoned")]
    LockPoisoned,

    #[error("no open transaction")]
    NoTransaction,

    #[error("{0}")]
    Other(String),
}

/// What went wrong with one part of a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemErrorKind {
    Validation { problems: Vec<FieldProblem> },
    Insert { message: String },
    /// Closing the prepared insert statement failed; not tied to one item
    Finalize { message: String },
}

/// One entry of the aggregated error list returned for a rejected batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemError {
    /// Position in the submitted batch, `None` for batch-level failures
    pub index: Option<usize>,
    pub voice_id: Option<String>,
    #[serde(flatten)]
    pub kind: ItemErrorKind,
}

impl ItemError {
    pub fn validation(index: usize, voice_id: &str, problems: Vec<FieldProblem>) -> Self {
        Self {
            index: Some(index),
            voice_id: Some(voice_id.to_string()),
            kind: ItemErrorKind::Validation { problems },
        }
    }

    pub fn insert(index: usize, voice_id: &str, err: &StoreError) -> Self {
        Self {
            index: Some(index),
            voice_id: Some(voice_id.to_string()),
            kind: ItemErrorKind::Insert { message: err.to_string() },
        }
    }

    pub fn finalize(err: &StoreError) -> Self {
        Self {
            index: None,
            voice_id: None,
            kind: ItemErrorKind::Finalize { message: err.to_string() },
        }
    }
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.index {
            write!(f, "Item {} (voice_id: {}): ", index, self.voice_id.as_deref().unwrap_or("unknown"))?;
        }
        match &self.kind {
            ItemErrorKind::Validation { problems } => {
                let described: Vec<String> = problems.iter().map(|p| p.to_string()).collect();
                write!(f, "invalid rating - {}", described.join(", "))
            }
            ItemErrorKind::Insert { message } => write!(f, "DB Error - {}", message),
            ItemErrorKind::Finalize { message } => {
                write!(f, "Database Error: Failed to finalize statement - {}", message)
            }
        }
    }
}

/// Coarse tag for a failed submission, stable across transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    EmptyBatch,
    Begin,
    Rejected,
    Commit,
    Rollback,
    Timeout,
}

/// What had already gone wrong when a rollback itself failed
#[derive(Debug)]
pub enum RollbackCause {
    Rejected(Vec<ItemError>),
    Commit(StoreError),
    Timeout { elapsed: Duration, errors: Vec<ItemError> },
}

impl fmt::Display for RollbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackCause::Rejected(errors) => write!(f, "{} item error(s)", errors.len()),
            RollbackCause::Commit(err) => write!(f, "commit failure ({})", err),
            RollbackCause::Timeout { elapsed, .. } => write!(f, "timeout after {:?}", elapsed),
        }
    }
}

/// Why a batch was not persisted. Every variant means zero rows were written.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("expected a non-empty batch of ratings")]
    EmptyBatch,

    #[error("failed to begin transaction: {source}")]
    Begin { source: StoreError },

    #[error("submission failed, {} error(s) occurred; no ratings were saved", .errors.len())]
    Rejected { errors: Vec<ItemError> },

    #[error("database commit failed: {source}; transaction rolled back")]
    Commit { source: StoreError },

    /// The store may hold a half-finished transaction and needs an operator
    #[error("rollback failed after {cause}: {rollback}")]
    RollbackFailed { cause: RollbackCause, rollback: StoreError },

    #[error("transaction exceeded its {limit:?} limit after {elapsed:?}; rolled back")]
    Timeout {
        limit: Duration,
        elapsed: Duration,
        errors: Vec<ItemError>,
    },
}

impl SubmitError {
    pub fn class(&self) -> FailureClass {
        match self {
            SubmitError::EmptyBatch => FailureClass::EmptyBatch,
            SubmitError::Begin { .. } => FailureClass::Begin,
            SubmitError::Rejected { .. } => FailureClass::Rejected,
            SubmitError::Commit { .. } => FailureClass::Commit,
            SubmitError::RollbackFailed { .. } => FailureClass::Rollback,
            SubmitError::Timeout { .. } => FailureClass::Timeout,
        }
    }

    /// Per-item problems collected before the rollback decision
    pub fn item_errors(&self) -> &[ItemError] {
        match self {
            SubmitError::Rejected { errors }
            | SubmitError::Timeout { errors, .. }
            | SubmitError::RollbackFailed { cause: RollbackCause::Rejected(errors), .. }
            | SubmitError::RollbackFailed { cause: RollbackCause::Timeout { errors, .. }, .. } => errors.as_slice(),
            _ => &[],
        }
    }
}

//! All-or-nothing persistence of a rating batch
//!
//! The coordinator opens one transaction for the whole batch, validates and
//! inserts every item in order without stopping at the first failure, and only
//! then decides: commit when nothing went wrong, roll back otherwise. Callers
//! get either the number of stored rows or the complete list of problems.

use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

use super::error::{ItemError, RollbackCause, SubmitError};
use super::store::RatingStore;
use super::validator::{RatingValidator, ValidationOutcome};
use crate::database::models::RatingSubmission;

/// Default upper bound on one submission's transaction
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a committed batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub batch_id: Uuid,
    /// Rows persisted; always equals the batch length
    pub count: usize,
    pub row_ids: Vec<i64>,
    pub submitted_at: String,
}

#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    validator: RatingValidator,
    timeout: Option<Duration>,
}

impl Default for BatchCoordinator {
    fn default() -> Self {
        Self::new(RatingValidator::default(), Some(DEFAULT_SUBMIT_TIMEOUT))
    }
}

impl BatchCoordinator {
    pub fn new(validator: RatingValidator, timeout: Option<Duration>) -> Self {
        Self { validator, timeout }
    }

    fn timed_out(&self, started: Instant) -> bool {
        self.timeout.is_some_and(|limit| started.elapsed() >= limit)
    }

    /// Persist `batch` atomically through `store`.
    ///
    /// Every error return means no row of this batch was kept.
    pub fn submit<S: RatingStore>(
        &self,
        store: &mut S,
        batch: &[RatingSubmission],
    ) -> Result<SubmissionReceipt, SubmitError> {
        if batch.is_empty() {
            return Err(SubmitError::EmptyBatch);
        }

        let batch_id = Uuid::new_v4();
        let started = Instant::now();

        store.begin().map_err(|source| {
            log::error!("[batch {}] Error beginning transaction: {}", batch_id, source);
            SubmitError::Begin { source }
        })?;
        log::info!("[batch {}] Transaction started for {} rating(s)", batch_id, batch.len());

        let mut errors: Vec<ItemError> = Vec::new();
        let mut row_ids = Vec::with_capacity(batch.len());
        let mut timed_out = false;

        for (index, submission) in batch.iter().enumerate() {
            if self.timed_out(started) {
                timed_out = true;
                break;
            }

            match self.validator.validate(submission) {
                ValidationOutcome::Invalid(problems) => {
                    let error = ItemError::validation(index, submission.voice_id_or_unknown(), problems);
                    log::warn!("[batch {}] {}", batch_id, error);
                    errors.push(error);
                }
                ValidationOutcome::Valid(rating) => match store.insert(&rating) {
                    Ok(row_id) => row_ids.push(row_id),
                    Err(e) => {
                        let error = ItemError::insert(index, &rating.voice_id, &e);
                        log::error!("[batch {}] {}", batch_id, error);
                        errors.push(error);
                    }
                },
            }
        }

        if let Err(e) = store.finalize() {
            log::error!("[batch {}] Error finalizing statement: {}", batch_id, e);
            errors.push(ItemError::finalize(&e));
        }

        if timed_out || self.timed_out(started) {
            let elapsed = started.elapsed();
            let limit = self.timeout.unwrap_or_default();
            log::error!(
                "[batch {}] Transaction exceeded {:?} (elapsed {:?}). Rolling back...",
                batch_id, limit, elapsed
            );
            return Err(match store.rollback() {
                Ok(()) => SubmitError::Timeout { limit, elapsed, errors },
                Err(rollback) => {
                    log::error!("[batch {}] Rollback failed after timeout: {}", batch_id, rollback);
                    SubmitError::RollbackFailed {
                        cause: RollbackCause::Timeout { elapsed, errors },
                        rollback,
                    }
                }
            });
        }

        if !errors.is_empty() {
            log::info!(
                "[batch {}] Errors occurred ({}). Attempting rollback...",
                batch_id,
                errors.len()
            );
            return Err(match store.rollback() {
                Ok(()) => {
                    log::info!("[batch {}] Rollback successful", batch_id);
                    SubmitError::Rejected { errors }
                }
                Err(rollback) => {
                    log::error!("[batch {}] Rollback failed: {}", batch_id, rollback);
                    SubmitError::RollbackFailed {
                        cause: RollbackCause::Rejected(errors),
                        rollback,
                    }
                }
            });
        }

        if let Err(commit) = store.commit() {
            log::error!("[batch {}] Commit failed: {}", batch_id, commit);
            return Err(match store.rollback() {
                Ok(()) => SubmitError::Commit { source: commit },
                Err(rollback) => {
                    log::error!("[batch {}] Rollback failed after commit error: {}", batch_id, rollback);
                    SubmitError::RollbackFailed {
                        cause: RollbackCause::Commit(commit),
                        rollback,
                    }
                }
            });
        }

        debug_assert_eq!(row_ids.len(), batch.len());
        log::info!(
            "[batch {}] Commit successful. Inserted {} rating(s) in {:?}",
            batch_id,
            row_ids.len(),
            started.elapsed()
        );

        Ok(SubmissionReceipt {
            batch_id,
            count: row_ids.len(),
            row_ids,
            submitted_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

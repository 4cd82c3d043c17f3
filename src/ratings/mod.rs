// Rating submission: validation and all-or-nothing batch persistence

pub mod coordinator;
pub mod error;
pub mod store;
pub mod validator;

pub use coordinator::{BatchCoordinator, SubmissionReceipt, DEFAULT_SUBMIT_TIMEOUT};
pub use error::{FailureClass, ItemError, ItemErrorKind, RollbackCause, StoreError, SubmitError};
pub use store::RatingStore;
pub use validator::{
    transcription_changed, FieldProblem, RatingField, RatingValidator, ValidationOutcome,
    DEFAULT_RATING_BOUNDS,
};

// Database models - Re-exports all domain-specific models
//
// - rating.rs: Submitted, validated and persisted ratings

mod rating;

pub use rating::{NewRating, RatingField, RatingSubmission, StoredRating, WireProblem};

//! Structural checks for a single submitted rating

use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::database::models::{NewRating, RatingSubmission, WireProblem};

pub use crate::database::models::RatingField;

/// Default inclusive bounds for the three score fields
pub const DEFAULT_RATING_BOUNDS: RangeInclusive<i64> = 1..=5;

/// A missing or violated field of one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum FieldProblem {
    Missing { field: RatingField },
    Empty { field: RatingField },
    OutOfRange { field: RatingField, value: i64, min: i64, max: i64 },
    InvalidType { field: RatingField, expected: &'static str },
    NotAnObject,
}

impl FieldProblem {
    pub fn field(&self) -> Option<RatingField> {
        match self {
            FieldProblem::Missing { field }
            | FieldProblem::Empty { field }
            | FieldProblem::OutOfRange { field, .. }
            | FieldProblem::InvalidType { field, .. } => Some(*field),
            FieldProblem::NotAnObject => None,
        }
    }
}

impl From<WireProblem> for FieldProblem {
    fn from(problem: WireProblem) -> Self {
        match problem {
            WireProblem::NotAnObject => FieldProblem::NotAnObject,
            WireProblem::InvalidType { field, expected } => FieldProblem::InvalidType { field, expected },
        }
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing { field } => write!(f, "missing {}", field),
            FieldProblem::Empty { field } => write!(f, "empty {}", field),
            FieldProblem::OutOfRange { field, value, min, max } => {
                write!(f, "{} {} outside {}..={}", field, value, min, max)
            }
            FieldProblem::InvalidType { field, expected } => write!(f, "{} is not a valid {}", field, expected),
            FieldProblem::NotAnObject => f.write_str("item is not a JSON object"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid(NewRating),
    Invalid(Vec<FieldProblem>),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid(_))
    }
}

/// True when the trimmed edit differs from the original text as stored
pub fn transcription_changed(original: &str, edited: &str) -> bool {
    edited.trim() != original
}

/// Checks one [`RatingSubmission`] and turns it into an insertable [`NewRating`]
#[derive(Debug, Clone, PartialEq)]
pub struct RatingValidator {
    bounds: Option<RangeInclusive<i64>>,
}

impl Default for RatingValidator {
    fn default() -> Self {
        Self::new(Some(DEFAULT_RATING_BOUNDS))
    }
}

impl RatingValidator {
    pub fn new(bounds: Option<RangeInclusive<i64>>) -> Self {
        Self { bounds }
    }

    /// Only checks that every score is present
    pub fn presence_only() -> Self {
        Self::new(None)
    }

    pub fn validate(&self, submission: &RatingSubmission) -> ValidationOutcome {
        if submission.wire_problems.contains(&WireProblem::NotAnObject) {
            return ValidationOutcome::Invalid(vec![FieldProblem::NotAnObject]);
        }

        // Wrong-typed fields are reported once, not again as missing
        let mut problems: Vec<FieldProblem> =
            submission.wire_problems.iter().copied().map(FieldProblem::from).collect();
        let malformed: Vec<RatingField> = problems.iter().filter_map(FieldProblem::field).collect();

        let voice_id = required_text(&submission.voice_id, RatingField::VoiceId, &malformed, &mut problems);
        let original = required_text(
            &submission.original_transcription,
            RatingField::OriginalTranscription,
            &malformed,
            &mut problems,
        );

        // May be empty, but the rater must have sent it
        let edited = match &submission.edited_transcription {
            Some(text) => Some(text.trim().to_string()),
            None => {
                missing(RatingField::EditedTranscription, &malformed, &mut problems);
                None
            }
        };

        let noise = self.score(submission.noise_rating, RatingField::NoiseRating, &malformed, &mut problems);
        let naturalness = self.score(
            submission.naturalness_rating,
            RatingField::NaturalnessRating,
            &malformed,
            &mut problems,
        );
        let pronunciation = self.score(
            submission.pronunciation_rating,
            RatingField::PronunciationRating,
            &malformed,
            &mut problems,
        );

        match (voice_id, original, edited, noise, naturalness, pronunciation) {
            (Some(voice_id), Some(original), Some(edited), Some(noise), Some(naturalness), Some(pronunciation))
                if problems.is_empty() =>
            {
                let changed = transcription_changed(&original, &edited);
                ValidationOutcome::Valid(NewRating {
                    voice_id,
                    original_transcription: original,
                    edited_transcription: edited,
                    transcription_changed: changed,
                    noise_rating: noise,
                    naturalness_rating: naturalness,
                    pronunciation_rating: pronunciation,
                    username: submission
                        .username
                        .as_deref()
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string),
                })
            }
            _ => ValidationOutcome::Invalid(problems),
        }
    }

    fn score(
        &self,
        value: Option<i64>,
        field: RatingField,
        malformed: &[RatingField],
        problems: &mut Vec<FieldProblem>,
    ) -> Option<i64> {
        let Some(value) = value else {
            missing(field, malformed, problems);
            return None;
        };

        if let Some(bounds) = &self.bounds {
            if !bounds.contains(&value) {
                problems.push(FieldProblem::OutOfRange {
                    field,
                    value,
                    min: *bounds.start(),
                    max: *bounds.end(),
                });
                return None;
            }
        }

        Some(value)
    }
}

fn missing(field: RatingField, malformed: &[RatingField], problems: &mut Vec<FieldProblem>) {
    if !malformed.contains(&field) {
        problems.push(FieldProblem::Missing { field });
    }
}

fn required_text(
    value: &Option<String>,
    field: RatingField,
    malformed: &[RatingField],
    problems: &mut Vec<FieldProblem>,
) -> Option<String> {
    match value {
        None => {
            missing(field, malformed, problems);
            None
        }
        Some(text) if text.trim().is_empty() => {
            problems.push(FieldProblem::Empty { field });
            None
        }
        Some(text) => Some(text.clone()),
    }
}

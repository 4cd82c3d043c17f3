// Database models - Rating
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named field of a submitted rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingField {
    VoiceId,
    OriginalTranscription,
    EditedTranscription,
    NoiseRating,
    NaturalnessRating,
    PronunciationRating,
    Username,
}

impl RatingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingField::VoiceId => "voice_id",
            RatingField::OriginalTranscription => "original_transcription",
            RatingField::EditedTranscription => "edited_transcription",
            RatingField::NoiseRating => "noise_rating",
            RatingField::NaturalnessRating => "naturalness_rating",
            RatingField::PronunciationRating => "pronunciation_rating",
            RatingField::Username => "username",
        }
    }
}

impl fmt::Display for RatingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A wire value that could not be read as the type its field expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProblem {
    NotAnObject,
    InvalidType { field: RatingField, expected: &'static str },
}

/// One rating as submitted by a rater.
///
/// Every field is optional on the wire so that a missing value is reported
/// as a validation problem for that item instead of failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSubmission {
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub original_transcription: Option<String>,
    #[serde(default)]
    pub edited_transcription: Option<String>,
    #[serde(default)]
    pub noise_rating: Option<i64>,
    #[serde(default)]
    pub naturalness_rating: Option<i64>,
    #[serde(default)]
    pub pronunciation_rating: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    /// Values present on the wire but of the wrong JSON type
    #[serde(skip)]
    pub wire_problems: Vec<WireProblem>,
}

impl RatingSubmission {
    /// Lenient decode of one batch element.
    ///
    /// A field holding the wrong JSON type is left unset and recorded in
    /// `wire_problems`, so one malformed item never hides the rest of the batch.
    pub fn from_json(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self {
                wire_problems: vec![WireProblem::NotAnObject],
                ..Self::default()
            };
        };

        let mut problems = Vec::new();
        let voice_id = text_field(&map, RatingField::VoiceId, &mut problems);
        let original_transcription = text_field(&map, RatingField::OriginalTranscription, &mut problems);
        let edited_transcription = text_field(&map, RatingField::EditedTranscription, &mut problems);
        let noise_rating = integer_field(&map, RatingField::NoiseRating, &mut problems);
        let naturalness_rating = integer_field(&map, RatingField::NaturalnessRating, &mut problems);
        let pronunciation_rating = integer_field(&map, RatingField::PronunciationRating, &mut problems);
        let username = text_field(&map, RatingField::Username, &mut problems);

        Self {
            voice_id,
            original_transcription,
            edited_transcription,
            noise_rating,
            naturalness_rating,
            pronunciation_rating,
            username,
            wire_problems: problems,
        }
    }

    /// Voice id for diagnostics, `unknown` when absent or blank
    pub fn voice_id_or_unknown(&self) -> &str {
        match self.voice_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id,
            _ => "unknown",
        }
    }
}

fn text_field(map: &Map<String, Value>, field: RatingField, problems: &mut Vec<WireProblem>) -> Option<String> {
    match map.get(field.as_str()) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            problems.push(WireProblem::InvalidType { field, expected: "string" });
            None
        }
    }
}

fn integer_field(map: &Map<String, Value>, field: RatingField, problems: &mut Vec<WireProblem>) -> Option<i64> {
    match map.get(field.as_str()) {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_i64() {
            Some(n) => Some(n),
            None => {
                problems.push(WireProblem::InvalidType { field, expected: "integer" });
                None
            }
        },
    }
}

/// A validated rating ready to be inserted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRating {
    pub voice_id: String,
    pub original_transcription: String,
    pub edited_transcription: String,
    pub transcription_changed: bool,
    pub noise_rating: i64,
    pub naturalness_rating: i64,
    pub pronunciation_rating: i64,
    pub username: Option<String>,
}

/// A persisted row of the `ratings` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRating {
    pub id: i64,
    pub voice_id: String,
    pub original_transcription: Option<String>,
    pub edited_transcription: Option<String>,
    pub transcription_changed: bool,
    pub noise_rating: Option<i64>,
    pub naturalness_rating: Option<i64>,
    pub pronunciation_rating: Option<i64>,
    pub username: Option<String>,
    pub timestamp: String,
}

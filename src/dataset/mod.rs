// Dataset module for voice-rating
// Loads the clip index once at startup and samples from it per request

pub mod index;
pub mod sampler;
pub mod source;

use std::path::PathBuf;

use thiserror::Error;

pub use index::{DatasetEntry, DatasetIndex};
pub use sampler::{sample_with, Sampler};
pub use source::DatasetSource;

/// Why a dataset load produced no usable entries
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read dataset file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to fetch dataset from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("dataset file is empty or has no data rows")]
    NoDataRows,

    #[error("required columns 'path' or 'sentence' not found in header: {}", .found.join(", "))]
    MissingColumns { found: Vec<String> },

    #[error("parsing {rows} row(s) produced zero valid dataset entries")]
    NoValidRows { rows: usize },
}

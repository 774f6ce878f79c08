// Error taxonomy for the normalization pipeline
//
// Malformed input and bad configuration abort the run. "No match" conditions
// are never errors: they resolve to a fallback category or leave the
// transaction untouched.

use thiserror::Error;

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

/// Raised while loading the user configuration, before any transaction is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("category tag '{tag}' of '{category}' must start with '#'")]
    InvalidTag { category: String, tag: String },

    #[error("category name must not be empty")]
    EmptyCategoryName,

    #[error("category '{0}' is defined more than once")]
    DuplicateCategory(String),

    #[error("BankProcessingTimeInDays must be positive, got {0}")]
    InvalidProcessingWindow(i64),
}

// ============================================================================
// PIPELINE ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A raw record is missing a required field or holds an unusable value.
    #[error("malformed transaction record {record}: {reason}")]
    MalformedRecord { record: String, reason: String },

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange { start: String, end: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn malformed(record: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::MalformedRecord {
            record: record.into(),
            reason: reason.into(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

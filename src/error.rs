use thiserror::Error;

/// Failures while turning free-text date expressions into calendar dates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    #[error("Unknown month name: {0}")]
    UnknownMonth(String),

    #[error("Malformed date expression '{text}': {reason}")]
    Malformed { text: String, reason: String },

    #[error("Invalid number '{0}' in date expression")]
    InvalidNumber(String),

    #[error("No such calendar date: {year}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("Date range '{0}' ends before it starts")]
    InvertedRange(String),

    #[error("Empty date expression")]
    Empty,
}

impl DateParseError {
    pub(crate) fn malformed(text: &str, reason: impl Into<String>) -> Self {
        DateParseError::Malformed {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

/// Raw events rejected at the builder boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field '{0}' is empty")]
    EmptyField(&'static str),

    #[error("Event '{0}' has no 'Event Page' link")]
    MissingEventPage(String),

    #[error("Event '{name}' starts ({start}) after it ends ({end})")]
    InvertedDates {
        name: String,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Unparseable dates for '{name}': {source}")]
    Dates {
        name: String,
        #[source]
        source: DateParseError,
    },
}

/// Persistence failures. Loading never fails (a missing or corrupt document
/// reads as an empty store), so only the write side is represented.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write store {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unknown region '{0}'")]
    UnknownRegion(String),

    #[error("Invalid month table entry '{name}' = {value}")]
    InvalidMonth { name: String, value: u32 },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Date(#[from] DateParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

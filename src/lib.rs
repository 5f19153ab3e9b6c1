//! Energy Ingest Library
//!
//! A Rust library for validating and normalizing solar and wind telemetry
//! CSV uploads into forecast-ready JSON datasets.
//!
//! This library provides tools for:
//! - Tokenizing CSV streams incrementally, tolerant of lines split across chunks
//! - Classifying a file's time granularity from its header
//! - Validating column completeness and timestamp consistency per schema
//! - Aggregating rows into hourly, daily or ISO-weekly periods
//! - Running the whole pipeline on a background task with progress messages
//! - Preparing the normalized dataset and a suggested filename for hand-off

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod aggregator;
        pub mod csv_tokenizer;
        pub mod dataset_export;
        pub mod pipeline;
        pub mod row_validator;
        pub mod schema_registry;
        pub mod timestamp_classifier;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{Domain, DomainRecord, Granularity, PipelineOutcome, Schema};
pub use app::services::pipeline::{PipelineCoordinator, PipelineHandle, PipelineMessage};
pub use config::{Config, PipelineConfig};

/// Result type alias for the ingestion pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for CSV ingestion, validation and aggregation
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The pipeline was started without a file
    #[error("No file provided")]
    NoFileProvided,

    /// Fewer than two non-empty lines (no data rows after the header)
    #[error("No data found in CSV file: it is empty or contains only a header row")]
    EmptyOrHeaderOnlyFile,

    /// Zero or several of the time columns (date, time, week) in the header
    #[error(
        "CSV must contain exactly one time-related column: date, time, or week (header: {})",
        .header.join(", ")
    )]
    AmbiguousTimeColumn { header: Vec<String> },

    /// Several header columns share a name (possibly after alias normalization)
    #[error("Duplicate columns in header: {}", .columns.join(", "))]
    DuplicateColumns { columns: Vec<String> },

    /// Required domain columns absent from the header
    #[error("Missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    /// A row's timestamp does not match the format of the detected granularity
    #[error("Invalid timestamp on line {line}: '{value}'. Expected a value like {expected}")]
    InvalidTimestamp {
        row_index: usize,
        line: usize,
        value: String,
        expected: String,
    },

    /// No schema registered for the domain/granularity pair
    #[error("Unknown schema: no {granularity} schema defined for {domain} data")]
    UnknownSchema {
        domain: Domain,
        granularity: Granularity,
    },

    /// The file's granularity differs from the one the caller expects
    #[error("Expected {expected} data but the file contains {detected} timestamps")]
    GranularityMismatch {
        expected: Granularity,
        detected: Granularity,
    },

    /// Requested aggregation granularity is finer than the file's
    #[error("Cannot aggregate {detected} data into finer {target} periods")]
    InvalidGranularityTarget {
        detected: Granularity,
        target: Granularity,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization of the normalized dataset failed
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Processing interrupted
    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },

    /// Unexpected fault inside a pipeline stage
    #[error("Internal pipeline error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Create an ambiguous time column error from a header
    pub fn ambiguous_time_column(header: &[String]) -> Self {
        Self::AmbiguousTimeColumn {
            header: header.to_vec(),
        }
    }

    /// Create a missing columns error
    pub fn missing_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingColumns {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a duplicate columns error
    pub fn duplicate_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::DuplicateColumns {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an invalid timestamp error
    pub fn invalid_timestamp(
        row_index: usize,
        line: usize,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidTimestamp {
            row_index,
            line,
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create an unknown schema error
    pub fn unknown_schema(domain: Domain, granularity: Granularity) -> Self {
        Self::UnknownSchema {
            domain,
            granularity,
        }
    }

    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a serialization error with context
    pub fn serialization(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            message: message.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a processing interrupted error
    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }

    /// Create an internal pipeline error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Data row index for errors tied to a specific row
    pub fn row_index(&self) -> Option<usize> {
        match self {
            Self::InvalidTimestamp { row_index, .. } => Some(*row_index),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON serialization failed".to_string(),
            source: error,
        }
    }
}

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which record shape a payload was validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    SearchSummary,
    Detail,
    Filtered,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::SearchSummary => "search result",
            RecordKind::Detail => "student detail",
            RecordKind::Filtered => "filtered record",
        };
        f.write_str(label)
    }
}

/// An upstream payload did not match the expected record shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{record} failed validation: {message}")]
pub struct SchemaError {
    pub record: RecordKind,
    pub message: String,
}

impl SchemaError {
    pub fn new(record: RecordKind, message: impl Into<String>) -> Self {
        Self {
            record,
            message: message.into(),
        }
    }
}

/// Failures while loading batch configuration or writing batch output.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid batch document {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed writing csv to {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("batch configuration error: {0}")]
    Configuration(String),
}

//! Error types for fitdb

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while ingesting FIT files
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Truncated {section}: expected {expected} bytes, got {actual}")]
    TruncatedInput {
        section: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid data type marker: expected \".FIT\", got \"{}\"", .found.escape_ascii())]
    InvalidMagic { found: [u8; 4] },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot traverse {}: {source}", .path.display())]
    RootUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl IngestError {
    /// Classify the error for per-file reporting
    pub fn kind(&self) -> FailureKind {
        match self {
            IngestError::Io(_) | IngestError::Walk(_) | IngestError::RootUnreadable { .. } => {
                FailureKind::IoFailure
            }
            IngestError::TruncatedInput { .. } => FailureKind::TruncatedInput,
            IngestError::InvalidMagic { .. } => FailureKind::InvalidMagic,
            IngestError::Storage(_) => FailureKind::StorageFailure,
            IngestError::Json(_) | IngestError::Config(_) => FailureKind::Other,
        }
    }
}

/// Serializable failure category attached to each failed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    IoFailure,
    TruncatedInput,
    InvalidMagic,
    StorageFailure,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::IoFailure => "io_failure",
            FailureKind::TruncatedInput => "truncated_input",
            FailureKind::InvalidMagic => "invalid_magic",
            FailureKind::StorageFailure => "storage_failure",
            FailureKind::Other => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

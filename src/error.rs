// ❗ Registry errors
//
// Row-level and source-level variants are produced by the import path and are
// contained by the driver. NotFound / Conflict / Validation are returned to the
// caller of explicit single-record operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Malformed or semantically invalid row; the driver skips it
    #[error("invalid row: {reason}")]
    InvalidRow { reason: String },

    /// Data source could not be opened or read; aborts the current pass only
    #[error("data source {source_name} unavailable")]
    SourceUnavailable {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    /// Input to an explicit operation failed a field rule
    #[error("validation failed for {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("database error")]
    Database(#[from] rusqlite::Error),
}

impl RegistryError {
    pub fn invalid_row(reason: impl Into<String>) -> Self {
        RegistryError::InvalidRow {
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        RegistryError::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl Into<String>) -> Self {
        RegistryError::Conflict {
            entity,
            key: key.into(),
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        RegistryError::Validation {
            field,
            message: message.into(),
        }
    }

    /// True for errors that only affect a single row of an import
    pub fn is_row_level(&self) -> bool {
        matches!(self, RegistryError::InvalidRow { .. })
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

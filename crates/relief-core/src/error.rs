//! Error types for the relief data layer.

use thiserror::Error;

/// Failures raised by a key-value backend.
///
/// Plain reads log read-side failures and degrade to an empty collection.
/// Repair routines use the strict read and see them as errors. Write-side
/// failures are always propagated.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o failure on key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize collection '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("collection '{key}' is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ReliefError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Illegal {entity} status transition: {from} -> {to}")]
    IllegalTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("Version conflict on {entity} {id}: expected {expected}, found {actual}")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReliefError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type ReliefResult<T> = Result<T, ReliefError>;

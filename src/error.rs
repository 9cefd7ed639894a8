//! Error types for mirrorcache
//!
//! All modules use `MirrorResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mirrorcache operations
pub type MirrorResult<T> = Result<T, MirrorError>;

/// All errors that can occur in mirrorcache
#[derive(Error, Debug)]
pub enum MirrorError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid resource {resource}: {reason}")]
    ResourceInvalid { resource: String, reason: String },

    #[error("Missing table name for resource {0}")]
    MissingTableName(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    #[error("Missing credentials for {0}")]
    MissingCredentials(String),

    // Source scanner errors
    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Source table not found: {table}")]
    SourceTableNotFound { table: String },

    #[error("Access denied to source table: {table}")]
    SourceAccessDenied { table: String },

    #[error("Scan of {table} failed: {reason}")]
    SourceScan { table: String, reason: String },

    // Key-value store errors
    #[error("Store error: {0}")]
    Store(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    // Lock errors
    #[error("Lock lost for resource {resource}")]
    LockLost { resource: String },

    // Engine errors
    #[error("Fetch of {resource} failed: {reason}")]
    FetchFailed { resource: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MirrorError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a scan failure for a table
    pub fn scan(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceScan {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic store error
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Store(reason.into())
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnreachable(_)
                | Self::SourceScan { .. }
                | Self::Store(_)
                | Self::StoreUnavailable(_)
                | Self::LockLost { .. }
        )
    }

    /// Whether this error belongs to the backing-store connectivity family
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::SourceUnreachable(_)
                | Self::SourceTableNotFound { .. }
                | Self::SourceAccessDenied { .. }
                | Self::MissingCredentials(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownResource(_) => Some("Run: mirrorcache status to list configured resources"),
            Self::MissingTableName(_) => Some("Set `table` for the resource in config.toml"),
            Self::StoreUnavailable(_) => Some("Check [store] backend and url in config.toml"),
            Self::SourceTableNotFound { .. } => Some("Check [source] path and the resource `table`"),
            Self::ConfigInvalid { .. } => Some("Run: mirrorcache config init --force to start over"),
            _ => None,
        }
    }
}

impl From<redis::RedisError> for MirrorError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_io_error() || err.is_timeout() {
            Self::StoreUnavailable(err.to_string())
        } else {
            Self::Store(err.to_string())
        }
    }
}

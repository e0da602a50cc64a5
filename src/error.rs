//! Error types shared by the store, repositories and services.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An operation needed a live connection (or a bound database) and there was none
    #[error("not connected: {0}")]
    NotConnected(String),

    /// The registry has no default connection manager installed
    #[error("default connection manager is not initialized")]
    NotInitialized,

    /// Dialing or probing the document store failed
    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed identifier '{0}'")]
    MalformedIdentifier(String),

    /// Update was attempted on an entity that never received an identity
    #[error("entity identity is required for update")]
    MissingIdentity,

    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("failed to fetch schema from '{location}': {message}")]
    SchemaFetch { location: String, message: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Any other failure reported by the storage driver
    #[error("store error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Prefix `context` onto the message while keeping the error kind.
    pub fn context(self, context: impl AsRef<str>) -> Self {
        let context = context.as_ref();
        match self {
            Error::NotConnected(msg) => Error::NotConnected(format!("{context}: {msg}")),
            Error::Connection(msg) => Error::Connection(format!("{context}: {msg}")),
            Error::DuplicateKey(msg) => Error::DuplicateKey(format!("{context}: {msg}")),
            Error::Backend(msg) => Error::Backend(format!("{context}: {msg}")),
            Error::Timeout { operation, after } => Error::Timeout {
                operation: format!("{context}: {operation}"),
                after,
            },
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                Error::DuplicateKey(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut => Error::Connection(err.to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                Error::Connection(err.to_string())
            }
            _ => Error::Backend(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a credential error
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True when the access credential itself was rejected. Credential
    /// errors abort a whole sync run; everything else stays scoped to the
    /// account that raised it.
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::Credential(_))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

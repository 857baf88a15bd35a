//! Common error types for ETMS

use crate::health::HealthError;
use thiserror::Error;

/// Common result type for ETMS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the ETMS crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found (or not visible to the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Health counts rejected by the classifier
    #[error(transparent)]
    Health(#[from] HealthError),

    /// Write would violate a uniqueness rule
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing, invalid or expired credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the role may not use this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed CSV upload
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

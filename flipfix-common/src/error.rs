//! Common error types for Flipfix

use thiserror::Error;

use crate::links::LinkValidationError;

/// Common result type for Flipfix operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Flipfix crates
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

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A link type name was registered twice
    #[error("Link type already registered: {0}")]
    DuplicateLinkType(String),

    /// Text contains link tokens that do not resolve
    #[error(transparent)]
    LinkValidation(#[from] LinkValidationError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

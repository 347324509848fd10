//! Common error types for the asset generation service

use thiserror::Error;

/// Common result type for forge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared across the workspace.
///
/// `InvalidInput`/`NotFound`/`Conflict` are caller errors and never mutate
/// state. `Generation` means an asset record was created and has already
/// been flipped to failed. `Provider` and `Timeout` are transient: safe to
/// retry from the caller's side.
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

    /// Conflicting in-flight work for the same resource
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream provider failure (network, 5xx, malformed response)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Generation failed after the asset record entered processing
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Bounded operation exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

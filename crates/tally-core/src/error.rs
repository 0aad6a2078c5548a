//! Error types for tally-core

use thiserror::Error;

/// Result type alias using tally-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tally-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Export package could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Import was rejected before anything was written
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A decision referenced a conflict outside the current batch
    #[error("Unknown conflict: {0}")]
    UnknownConflict(String),

    /// The stored value moved on after the conflict was detected
    #[error("Conflict {0} changed since it was detected; re-import the package")]
    StaleConflict(String),
}

/// Structural problems with a received export package.
///
/// Decoding never partially succeeds: any of these rejects the whole package.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed export package: {0}")]
    MalformedPayload(String),
    #[error("Unsupported export package version: {0}")]
    UnsupportedVersion(String),
    #[error("Unknown export type: {0}")]
    UnknownExportType(String),
}

/// Reasons an import is refused outright.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Package belongs to race '{found}', but the import target is race '{expected}'")]
    RaceMismatch { expected: String, found: String },
    #[error("Unreadable package: {0}")]
    UnreadablePackage(DecodeError),
}

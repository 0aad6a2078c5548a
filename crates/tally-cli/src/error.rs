use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid time '{0}': expected RFC 3339 or YYYY-MM-DD HH:MM (UTC)")]
    InvalidTime(String),
    #[error("Checkpoint {0} has not been imported")]
    CheckpointNotImported(u32),
    #[error("Nothing to update; pass --bucket-width or --comparable-fields")]
    NothingToUpdate,
    #[error("Conflict resolution aborted; {0} conflicts left pending")]
    ResolutionAborted(usize),
    #[error("Could not resolve a data directory; pass --db-path or set TALLY_DB_PATH")]
    NoDataDir,
}

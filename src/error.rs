//! Error types for the multi-volume recording store

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the recording store
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Path is not located under the logical recording root
    #[error("path not under video directory {root}: {path}")]
    OutsideVideoDir { root: PathBuf, path: PathBuf },

    /// Console command is missing a required argument
    #[error("missing arg")]
    MissingArgument { command: String },

    /// Unknown console command
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// No volume directories found under the mount prefix
    #[error("no volumes found under mount prefix {0}")]
    NoVolumes(PathBuf),

    /// Persisted bucket sequence cannot be applied to the current volumes
    #[error("invalid disk sequence '{seq}': {reason}")]
    InvalidDiskSeq { seq: String, reason: String },

    /// Free-space query failed for a volume
    #[error("space query failed for volume {0}")]
    SpaceQuery(PathBuf),

    /// A relocated file did not arrive intact at its destination
    #[error("size mismatch after copy: {source_path} -> {dest_path}")]
    SizeMismatch {
        source_path: PathBuf,
        dest_path: PathBuf,
    },

    /// A primitive filesystem operation reported failure
    #[error("filesystem operation '{op}' failed on {path}")]
    Fileop { op: &'static str, path: PathBuf },

    /// Task queue is shut down and no longer accepts work
    #[error("task queue is shut down")]
    QueueClosed,

    /// Configuration store error
    #[error("config store error: {0}")]
    ConfigStore(String),
}

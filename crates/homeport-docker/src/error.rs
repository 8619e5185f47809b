//! Error types for homeport-docker

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, DockerError>;

/// Errors talking to the container engine
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DockerError {
    /// Engine binary is not on PATH
    #[error("'{binary}' was not found on PATH\nHint: install Docker and make sure it is running")]
    NotInstalled { binary: String },

    /// Engine command exited unsuccessfully
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Output could not be parsed
    #[error("unexpected output from `{command}`: {message}")]
    Parse { command: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

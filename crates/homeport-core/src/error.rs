//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to parse settings: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {message}")]
    InvalidSettings { message: String },

    #[error("Unknown provider '{name}' (expected one of: {expected})")]
    UnknownProvider { name: String, expected: String },

    #[error("Invalid hostname '{host}': {reason}")]
    InvalidHost { host: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;

//! Error types for Alarmsweet

use thiserror::Error;

/// Core error type for Alarmsweet operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

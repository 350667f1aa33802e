use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Driver error: {0}")]
    Driver(String),
    #[error("Criteria error: {0}")]
    Criteria(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
    #[error("Execution cancelled")]
    Cancelled,
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),
    #[error("Background task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// Helper conversions
impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Driver(e.to_string())
    }
}
impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Join(e.to_string())
    }
}

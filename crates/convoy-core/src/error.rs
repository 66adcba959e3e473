use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvoyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("path resolution error: {0}")]
    PathResolution(String),
    #[error("launch error: {0}")]
    Launch(String),
    #[error("converter exited with status {0}")]
    ConversionFailure(i32),
    #[error("converter terminated by signal")]
    Terminated,
    #[error("timed out")]
    Timeout,
    #[error("serialization error: {0}")]
    Serialize(String),
}

pub type ConvoyResult<T> = Result<T, ConvoyError>;

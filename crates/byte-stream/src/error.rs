//! Stream error taxonomy

use thiserror::Error;

/// Stream adapter error
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream reached end of input")]
    Eof,

    #[error("Connection closed before {expected} bytes arrived (got {got})")]
    Incomplete { expected: usize, got: usize },

    #[error("Read of {requested} bytes exceeds limit of {limit}")]
    LimitExceeded { requested: usize, limit: usize },

    #[error("Transport failure: {0}")]
    Io(#[from] std::io::Error),
}

pub type StreamResult<T> = Result<T, StreamError>;

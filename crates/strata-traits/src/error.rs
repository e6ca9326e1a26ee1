//! Error type shared by the collaborator implementations.

use thiserror::Error;

/// Failure of a price sink, alert sink, codec or loader.
#[derive(Debug, Error)]
pub enum TraitError {
    /// Downstream consumer unreachable
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Input file or payload could not be decoded
    #[error("parse error: {0}")]
    ParseError(String),

    /// Record could not be encoded
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Reading or writing a file failed
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for TraitError {
    fn from(e: std::io::Error) -> Self {
        TraitError::IoError(e.to_string())
    }
}

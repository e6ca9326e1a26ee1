//! Server error types.

use thiserror::Error;

use strata_engine::EngineError;
use strata_traits::TraitError;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(#[from] std::io::Error),

    /// Instrument, event or output file error
    #[error(transparent)]
    Data(#[from] TraitError),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] EngineError),
}

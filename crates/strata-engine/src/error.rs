//! Engine error types.

use thiserror::Error;

use strata_traits::ids::InstrumentId;
use strata_traits::instrument::InstrumentKind;
use strata_traits::market_data::MarketEvent;

/// Registry administration errors. Synchronous to the caller, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// Adding the instrument's edges would create a cycle.
    #[error("cycle detected: {instrument} -> {dependency} closes a loop")]
    CycleDetected {
        /// Instrument being registered
        instrument: InstrumentId,
        /// Input whose edge closes the cycle
        dependency: InstrumentId,
    },

    /// The identifier exists with a conflicting kind.
    #[error("duplicate instrument {id}: registered as {existing}, got {requested}")]
    DuplicateInstrument {
        /// Instrument ID
        id: InstrumentId,
        /// Kind already registered
        existing: InstrumentKind,
        /// Kind in the rejected definition
        requested: InstrumentKind,
    },

    /// The instrument is not registered.
    #[error("instrument not found: {0}")]
    NotFound(InstrumentId),

    /// Other instruments still depend on it.
    #[error("instrument {id} is an input of {dependents:?}")]
    InUse {
        /// Instrument ID
        id: InstrumentId,
        /// Registered dependents
        dependents: Vec<InstrumentId>,
    },
}

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The ingestion queue is full; the rejected event is handed back.
    #[error("ingestion queue full")]
    Backpressure(Box<MarketEvent>),

    /// Registry error
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// No price has been recorded for the instrument.
    #[error("no price recorded for {0}")]
    PriceNotFound(InstrumentId),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Publishing failed after all retries
    #[error("publish error: {0}")]
    Publish(String),

    /// Shutdown
    #[error("engine is shutting down")]
    Shutdown,

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<strata_traits::TraitError> for EngineError {
    fn from(e: strata_traits::TraitError) -> Self {
        EngineError::Publish(e.to_string())
    }
}

impl EngineError {
    /// Returns true if the caller should retry later.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, EngineError::Backpressure(_))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

//! Price records and the valuation boundary.
//!
//! The engine never sees valuation internals: it resolves the inputs of an
//! instrument into [`ResolvedInputs`] and hands them to a [`ValuationModel`],
//! which returns a price or a typed [`ValuationError`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{InstrumentId, Version};
use crate::instrument::Instrument;
use crate::market_data::Observation;

// =============================================================================
// VALUATION ERRORS
// =============================================================================

/// Typed failure returned by a valuation model.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum ValuationError {
    /// A required input or observation field has no value.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// The model does not support this instrument's kind or parameters.
    #[error("model unsupported: {0}")]
    ModelUnsupported(String),

    /// The computation failed or did not finish in time.
    #[error("numerical failure: {reason}")]
    NumericalFailure {
        /// Description of the failure
        reason: String,
        /// True when the call exceeded its time budget
        #[serde(default)]
        timeout: bool,
    },
}

impl ValuationError {
    /// Numerical failure with a reason.
    pub fn numerical(reason: impl Into<String>) -> Self {
        ValuationError::NumericalFailure {
            reason: reason.into(),
            timeout: false,
        }
    }

    /// Numerical failure caused by the valuation call timing out.
    pub fn timeout(budget_ms: u64) -> Self {
        ValuationError::NumericalFailure {
            reason: format!("valuation exceeded {}ms", budget_ms),
            timeout: true,
        }
    }

    /// Returns true for the timeout variant of numerical failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ValuationError::NumericalFailure { timeout: true, .. })
    }

    /// Returns true if the failure needs operator attention.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ValuationError::ModelUnsupported(_))
    }
}

// =============================================================================
// PRICE RECORD
// =============================================================================

/// Status of a cached price.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStatus {
    /// Computed from the current versions of all inputs
    Fresh,
    /// An input changed; recomputation is pending
    Stale,
    /// The last computation failed; price is the last known good value
    Failed,
}

/// Why a record is Failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The valuation model returned an error.
    Valuation(ValuationError),
    /// A dependency is Failed, so the model was not invoked.
    DependencyFailed(InstrumentId),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Valuation(e) => write!(f, "{}", e),
            FailureReason::DependencyFailed(id) => write!(f, "dependency {} failed", id),
        }
    }
}

/// Dependency version consumed by a computation.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConsumedInput {
    /// Dependency
    pub instrument_id: InstrumentId,
    /// Dependency version at the time of computation (zero if it had none)
    pub version: Version,
}

/// Last computed price of an instrument. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Instrument
    pub instrument_id: InstrumentId,
    /// Last known good price (absent if the instrument never priced)
    pub price: Option<Decimal>,
    /// Own version; bumped only by successful computations
    pub version: Version,
    /// Dependency versions consumed, in input order
    pub inputs: Vec<ConsumedInput>,
    /// Observation version consumed (market-priced instruments)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_version: Option<Version>,
    /// Computation timestamp
    pub computed_at: DateTime<Utc>,
    /// Status
    pub status: PriceStatus,
    /// Failure reason for Failed records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl PriceRecord {
    /// Returns true if the record holds a usable price.
    pub fn is_fresh(&self) -> bool {
        self.status == PriceStatus::Fresh
    }

    /// Returns true if the last computation failed.
    pub fn is_failed(&self) -> bool {
        self.status == PriceStatus::Failed
    }

    /// Same record with a different status.
    pub fn with_status(&self, status: PriceStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

// =============================================================================
// RESOLVED INPUTS
// =============================================================================

/// Value of one dependency as seen by a computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    /// Dependency
    pub instrument_id: InstrumentId,
    /// Dependency price
    pub price: Decimal,
    /// Dependency version
    pub version: Version,
}

/// Inputs handed to a valuation model.
#[derive(Debug, Clone)]
pub struct ResolvedInputs {
    /// Valuation timestamp
    pub as_of: DateTime<Utc>,
    /// The instrument's own observation, if it has one
    pub observation: Option<Observation>,
    /// One slot per declared input; `None` if the input has no price yet
    pub inputs: Vec<Option<ResolvedInput>>,
}

impl ResolvedInputs {
    /// Inputs with no dependencies and no observation.
    pub fn empty(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            observation: None,
            inputs: Vec::new(),
        }
    }

    /// Price of the input at `index`.
    pub fn price(&self, index: usize) -> Result<Decimal, ValuationError> {
        match self.inputs.get(index) {
            Some(Some(input)) => Ok(input.price),
            Some(None) => Err(ValuationError::MissingInput(format!(
                "input #{} has no price",
                index
            ))),
            None => Err(ValuationError::MissingInput(format!(
                "input #{} not declared",
                index
            ))),
        }
    }

    /// Prices of all inputs; fails on the first missing one.
    pub fn prices(&self) -> Result<Vec<Decimal>, ValuationError> {
        (0..self.inputs.len()).map(|i| self.price(i)).collect()
    }

    /// The instrument's own observation.
    pub fn observation(&self) -> Result<&Observation, ValuationError> {
        self.observation
            .as_ref()
            .ok_or_else(|| ValuationError::MissingInput("no market observation".to_string()))
    }
}

// =============================================================================
// VALUATION MODEL
// =============================================================================

/// Valuation library boundary.
///
/// Implementations must be pure from the caller's perspective: the same
/// instrument and inputs give the same result. Calls may block; the engine
/// runs them on a bounded worker pool with a timeout.
pub trait ValuationModel: Send + Sync {
    /// Price an instrument from its resolved inputs.
    fn price(&self, instrument: &Instrument, inputs: &ResolvedInputs)
        -> Result<Decimal, ValuationError>;
}

impl<T: ValuationModel + ?Sized> ValuationModel for std::sync::Arc<T> {
    fn price(
        &self,
        instrument: &Instrument,
        inputs: &ResolvedInputs,
    ) -> Result<Decimal, ValuationError> {
        (**self).price(instrument, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_input_slot() {
        let inputs = ResolvedInputs {
            as_of: Utc::now(),
            observation: None,
            inputs: vec![
                Some(ResolvedInput {
                    instrument_id: InstrumentId::new("A"),
                    price: dec!(5),
                    version: Version(1),
                }),
                None,
            ],
        };

        assert_eq!(inputs.price(0), Ok(dec!(5)));
        assert!(matches!(inputs.price(1), Err(ValuationError::MissingInput(_))));
        assert!(matches!(inputs.price(2), Err(ValuationError::MissingInput(_))));
        assert!(inputs.prices().is_err());
        assert!(inputs.observation().is_err());
    }

    #[test]
    fn test_timeout_is_numerical_failure() {
        let err = ValuationError::timeout(250);
        assert!(err.is_timeout());
        assert!(!err.is_configuration());
        assert!(!ValuationError::numerical("nan").is_timeout());
        assert!(ValuationError::ModelUnsupported("x".into()).is_configuration());
    }
}

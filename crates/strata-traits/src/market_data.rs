//! Market events and aggregated observations.
//!
//! A [`MarketEvent`] is one raw tick from a feed. The engine folds accepted
//! events into one [`Observation`] per quoted instrument, and market-priced
//! instruments are valued from that observation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{InstrumentId, SourceId, Version};

// =============================================================================
// MARKET EVENT
// =============================================================================

/// Which part of the observation a market event updates.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteField {
    /// Last quoted price
    Last,
    /// Best bid
    Bid,
    /// Best ask
    Ask,
    /// Executed trade (price and volume); updates last and VWAP
    Trade,
    /// Official settlement price
    Settlement,
}

/// A raw market data event. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Instrument the event refers to
    pub instrument_id: InstrumentId,
    /// Originating feed
    #[serde(default)]
    pub source: SourceId,
    /// Monotonically increasing per-source sequence number
    pub sequence: u64,
    /// Updated field
    pub field: QuoteField,
    /// New raw value
    pub value: Decimal,
    /// Traded volume (trades only)
    #[serde(default)]
    pub volume: Option<Decimal>,
    /// Arrival timestamp
    pub timestamp: DateTime<Utc>,
}

impl MarketEvent {
    /// Create a last-price event from the default source, stamped now.
    pub fn last(instrument_id: impl Into<InstrumentId>, value: Decimal, sequence: u64) -> Self {
        Self::new(instrument_id, QuoteField::Last, value, sequence)
    }

    /// Create an event for the given field from the default source, stamped now.
    pub fn new(
        instrument_id: impl Into<InstrumentId>,
        field: QuoteField,
        value: Decimal,
        sequence: u64,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            source: SourceId::default(),
            sequence,
            field,
            value,
            volume: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a trade event.
    pub fn trade(
        instrument_id: impl Into<InstrumentId>,
        price: Decimal,
        volume: Decimal,
        sequence: u64,
    ) -> Self {
        Self {
            volume: Some(volume),
            ..Self::new(instrument_id, QuoteField::Trade, price, sequence)
        }
    }

    /// Set the originating source.
    pub fn with_source(mut self, source: impl Into<SourceId>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the arrival timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// =============================================================================
// OBSERVATION
// =============================================================================

/// Aggregated raw market state of one quoted instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Best bid
    pub bid: Option<Decimal>,
    /// Best ask
    pub ask: Option<Decimal>,
    /// Last price (quoted or traded)
    pub last: Option<Decimal>,
    /// Settlement price
    pub settlement: Option<Decimal>,
    /// Sum of price * volume over trades
    pub traded_notional: Decimal,
    /// Sum of volume over trades
    pub traded_volume: Decimal,
    /// Bumped on every accepted event
    pub version: Version,
    /// Timestamp of the last accepted event
    pub updated_at: Option<DateTime<Utc>>,
}

/// Why an event could not be folded into an observation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObservationError {
    /// Trade notional or volume left the representable range
    #[error("trade of {volume} at {value} overflows the traded totals")]
    TradeOverflow {
        /// Trade price
        value: Decimal,
        /// Trade volume
        volume: Decimal,
    },
}

impl Observation {
    /// Fold an accepted event into the observation and bump its version.
    ///
    /// Trades without a volume count as one unit. A trade whose totals would
    /// overflow is refused and leaves the observation untouched.
    pub fn apply(&mut self, event: &MarketEvent) -> Result<Version, ObservationError> {
        match event.field {
            QuoteField::Last => self.last = Some(event.value),
            QuoteField::Bid => self.bid = Some(event.value),
            QuoteField::Ask => self.ask = Some(event.value),
            QuoteField::Settlement => self.settlement = Some(event.value),
            QuoteField::Trade => {
                let volume = event.volume.unwrap_or(Decimal::ONE);
                if volume > Decimal::ZERO {
                    let overflow = || ObservationError::TradeOverflow {
                        value: event.value,
                        volume,
                    };
                    let notional = event
                        .value
                        .checked_mul(volume)
                        .and_then(|n| self.traded_notional.checked_add(n))
                        .ok_or_else(overflow)?;
                    let traded = self.traded_volume.checked_add(volume).ok_or_else(overflow)?;
                    self.traded_notional = notional;
                    self.traded_volume = traded;
                }
                self.last = Some(event.value);
            }
        }
        self.version = self.version.next();
        self.updated_at = Some(event.timestamp);
        Ok(self.version)
    }

    /// Mid of bid and ask, when both sides are present and their sum fits.
    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => bid.checked_add(ask).map(|sum| sum / Decimal::TWO),
            _ => None,
        }
    }

    /// Volume weighted average trade price.
    pub fn vwap(&self) -> Option<Decimal> {
        if self.traded_volume.is_zero() {
            None
        } else {
            self.traded_notional.checked_div(self.traded_volume)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_observation_mid_requires_both_sides() {
        let mut obs = Observation::default();
        obs.apply(&MarketEvent::new("Q1", QuoteField::Bid, dec!(99), 1)).unwrap();
        assert_eq!(obs.mid(), None);

        obs.apply(&MarketEvent::new("Q1", QuoteField::Ask, dec!(101), 2)).unwrap();
        assert_eq!(obs.mid(), Some(dec!(100)));
        assert_eq!(obs.version, Version(2));
    }

    #[test]
    fn test_vwap_accumulates_trades() {
        let mut obs = Observation::default();
        obs.apply(&MarketEvent::trade("Q1", dec!(10), dec!(100), 1)).unwrap();
        obs.apply(&MarketEvent::trade("Q1", dec!(12), dec!(300), 2)).unwrap();

        assert_eq!(obs.vwap(), Some(dec!(11.5)));
        assert_eq!(obs.last, Some(dec!(12)));
    }

    #[test]
    fn test_overflowing_trade_refused() {
        let mut obs = Observation::default();
        obs.apply(&MarketEvent::trade("Q1", dec!(10), dec!(100), 1)).unwrap();
        let before = obs.clone();

        let huge = MarketEvent::trade("Q1", Decimal::MAX / Decimal::TWO, dec!(10), 2);
        let err = obs.apply(&huge).unwrap_err();
        assert!(matches!(err, ObservationError::TradeOverflow { .. }));
        assert_eq!(obs, before);
        assert_eq!(obs.vwap(), Some(dec!(10)));
    }

    #[test]
    fn test_mid_of_extreme_quotes_is_none() {
        let mut obs = Observation::default();
        obs.apply(&MarketEvent::new("Q1", QuoteField::Bid, Decimal::MAX, 1)).unwrap();
        obs.apply(&MarketEvent::new("Q1", QuoteField::Ask, Decimal::MAX, 2)).unwrap();
        assert_eq!(obs.mid(), None);
    }

    #[test]
    fn test_event_source_defaults() {
        let json = r#"{
            "instrument_id": "Q1",
            "sequence": 4,
            "field": "last",
            "value": 100.5,
            "timestamp": "2026-01-02T10:00:00Z"
        }"#;
        let event: MarketEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.source, SourceId::default());
        assert_eq!(event.value, dec!(100.5));
    }
}

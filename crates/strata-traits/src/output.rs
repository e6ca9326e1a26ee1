//! Output publishing traits.
//!
//! - [`PriceSink`]: outbound price records
//! - [`AlertSink`]: pricing alerts
//!
//! Sinks can write to files, message brokers, sockets, etc. Delivery is
//! at-least-once; consumers dedupe on (instrument, version).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TraitError;
use crate::ids::InstrumentId;
use crate::pricing::PriceRecord;

// =============================================================================
// PRICE OUTPUT
// =============================================================================

/// Trait for price record publishing.
#[async_trait]
pub trait PriceSink: Send + Sync {
    /// Publish a single price record.
    async fn publish(&self, record: &PriceRecord) -> Result<(), TraitError>;

    /// Flush buffered output, if any.
    async fn flush(&self) -> Result<(), TraitError> {
        Ok(())
    }
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPriceSink;

#[async_trait]
impl PriceSink for NullPriceSink {
    async fn publish(&self, _record: &PriceRecord) -> Result<(), TraitError> {
        Ok(())
    }
}

// =============================================================================
// ALERTS
// =============================================================================

/// Alert severity level.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Critical
    Critical,
}

/// Alert categories raised by the engine.
pub mod alert_types {
    /// Model does not support an instrument (standing until it prices).
    pub const MODEL_UNSUPPORTED: &str = "model_unsupported";
    /// A previously unsupported instrument priced successfully.
    pub const MODEL_RECOVERED: &str = "model_recovered";
    /// A price record was dropped after exhausting publish retries.
    pub const PUBLISH_DROPPED: &str = "publish_dropped";
}

/// Pricing alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingAlert {
    /// Alert ID
    pub alert_id: String,
    /// Severity
    pub severity: AlertSeverity,
    /// Alert type (see [`alert_types`])
    pub alert_type: String,
    /// Message
    pub message: String,
    /// Related instrument (if any)
    pub instrument_id: Option<InstrumentId>,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

/// Trait for alert publishing.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Publish an alert.
    async fn publish(&self, alert: &PricingAlert) -> Result<(), TraitError>;
}

/// Alert sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAlertSink;

#[async_trait]
impl AlertSink for NullAlertSink {
    async fn publish(&self, _alert: &PricingAlert) -> Result<(), TraitError> {
        Ok(())
    }
}

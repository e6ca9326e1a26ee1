//! Inbound market data.
//!
//! Delivery threads hand events to an [`IngestHandle`], which only enqueues
//! into the bounded scheduler queue. A full queue is reported immediately
//! as `Backpressure`; nothing is dropped silently.

use std::sync::Arc;

use tokio::sync::mpsc;

use strata_traits::market_data::MarketEvent;

use crate::error::{EngineError, EngineResult};
use crate::stats::StatsCounters;

/// Cloneable, thread-safe entry point for market events.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::Sender<MarketEvent>,
    stats: Arc<StatsCounters>,
}

impl IngestHandle {
    pub(crate) fn new(tx: mpsc::Sender<MarketEvent>, stats: Arc<StatsCounters>) -> Self {
        Self { tx, stats }
    }

    /// Enqueue an event without waiting.
    ///
    /// Returns `Backpressure` carrying the event back if the queue is full,
    /// `Shutdown` if the engine has stopped.
    pub fn ingest(&self, event: MarketEvent) -> EngineResult<()> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                StatsCounters::incr(&self.stats.events_rejected);
                tracing::debug!(
                    instrument = %event.instrument_id,
                    sequence = event.sequence,
                    "Ingestion queue full"
                );
                Err(EngineError::Backpressure(Box::new(event)))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EngineError::Shutdown),
        }
    }

    /// Free slots in the queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

//! Feeds recorded market events into the engine.

use std::time::Duration;

use tracing::{debug, info};

use strata_engine::{EngineError, EngineResult, IngestHandle};
use strata_traits::market_data::MarketEvent;

/// Outcome of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events handed to the engine
    pub events: usize,
    /// Times an event was refused with backpressure and offered again
    pub backpressure_retries: u64,
}

/// Offer every event in order. A refused event is offered again after
/// `retry`, so no event is skipped and order is kept.
pub async fn replay<I>(handle: &IngestHandle, events: I, retry: Duration) -> EngineResult<ReplaySummary>
where
    I: IntoIterator<Item = MarketEvent>,
{
    let mut summary = ReplaySummary::default();

    for event in events {
        let mut pending = event;
        loop {
            match handle.ingest(pending) {
                Ok(()) => break,
                Err(EngineError::Backpressure(refused)) => {
                    summary.backpressure_retries += 1;
                    debug!(
                        instrument = %refused.instrument_id,
                        sequence = refused.sequence,
                        "Ingestion queue full, retrying"
                    );
                    tokio::time::sleep(retry).await;
                    pending = *refused;
                }
                Err(e) => return Err(e),
            }
        }
        summary.events += 1;
    }

    info!(
        events = summary.events,
        retries = summary.backpressure_retries,
        "Replay complete"
    );
    Ok(summary)
}

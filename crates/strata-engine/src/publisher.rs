//! Publisher gateway.
//!
//! Emits settled price records to the outbound [`PriceSink`] with bounded
//! exponential-backoff retries, and fans them out in-process through a
//! broadcast channel. Alerts go to the [`AlertSink`] without retries.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::sleep;

use strata_traits::config::RetryConfig;
use strata_traits::ids::InstrumentId;
use strata_traits::output::{AlertSeverity, AlertSink, PriceSink, PricingAlert};
use strata_traits::pricing::PriceRecord;

use crate::error::{EngineError, EngineResult};

/// Run an async operation until it succeeds or the retry budget runs out.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    tracing::warn!(
                        attempt,
                        max_attempts = config.max_attempts,
                        error = %e,
                        "All retry attempts exhausted"
                    );
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt - 1);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after delay"
                );
                sleep(delay).await;
            }
        }
    }
}

// =============================================================================
// PRICE PUBLISHING
// =============================================================================

/// Outbound price publishing.
pub(crate) struct PublisherGateway {
    sink: Arc<dyn PriceSink>,
    retry: RetryConfig,
    updates: broadcast::Sender<Arc<PriceRecord>>,
}

impl PublisherGateway {
    pub fn new(sink: Arc<dyn PriceSink>, retry: RetryConfig, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            sink,
            retry,
            updates,
        }
    }

    /// Publish one record. On exhaustion the record is dropped; the caller
    /// logs and counts it.
    pub async fn publish(&self, record: &Arc<PriceRecord>) -> EngineResult<()> {
        // In-process subscribers see every settled record, even if the sink fails.
        let _ = self.updates.send(Arc::clone(record));

        with_retry(&self.retry, move || self.sink.publish(record))
            .await
            .map_err(|e| {
                EngineError::Publish(format!(
                    "{} {}: {}",
                    record.instrument_id, record.version, e
                ))
            })?;

        tracing::debug!(
            instrument = %record.instrument_id,
            version = %record.version,
            status = ?record.status,
            "Price published"
        );
        Ok(())
    }

    /// Subscribe to settled records.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PriceRecord>> {
        self.updates.subscribe()
    }

    /// Flush the sink.
    pub async fn flush(&self) -> EngineResult<()> {
        self.sink.flush().await.map_err(EngineError::from)
    }
}

// =============================================================================
// ALERTS
// =============================================================================

/// Alert publishing. Failures are logged and otherwise ignored.
pub(crate) struct AlertGateway {
    sink: Arc<dyn AlertSink>,
}

impl AlertGateway {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink }
    }

    /// Build and publish an alert.
    pub async fn raise(
        &self,
        severity: AlertSeverity,
        alert_type: &str,
        instrument_id: Option<&InstrumentId>,
        message: String,
    ) {
        let alert = PricingAlert {
            alert_id: uuid::Uuid::new_v4().to_string(),
            severity,
            alert_type: alert_type.to_string(),
            message,
            instrument_id: instrument_id.cloned(),
            timestamp: Utc::now(),
        };

        if let Err(e) = self.sink.publish(&alert).await {
            tracing::warn!(
                alert_type = %alert.alert_type,
                error = %e,
                "Failed to publish alert"
            );
        }
    }
}

//! Valuation adapter.
//!
//! Wraps a [`ValuationModel`] behind a fixed-size worker pool and a per-call
//! timeout. Model calls run on the blocking thread pool; a [`Semaphore`]
//! bounds how many run at once. The timeout covers the wait for a worker as
//! well as the call. A call that exceeds it is reported as a timeout failure,
//! gives its worker slot back and is kept aside; once it finishes, the
//! scheduler collects the late result and decides whether it still applies.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

use strata_traits::ids::{InstrumentId, Version};
use strata_traits::instrument::Instrument;
use strata_traits::pricing::{ConsumedInput, ValuationError, ValuationModel};

use crate::context::PreparedInputs;

/// One valuation call.
#[derive(Debug, Clone)]
pub(crate) struct ValuationRequest {
    /// Instrument to price
    pub instrument: Arc<Instrument>,
    /// Resolved inputs and the versions they came from
    pub prepared: PreparedInputs,
    /// Own version at dispatch time
    pub base_version: Version,
}

/// Result of a call that finished after its timeout.
#[derive(Debug)]
pub(crate) struct LateResult {
    /// Instrument
    pub instrument_id: InstrumentId,
    /// Own version at dispatch time
    pub base_version: Version,
    /// Dependency versions the call consumed
    pub consumed: Vec<ConsumedInput>,
    /// Observation version the call consumed
    pub observation_version: Option<Version>,
    /// Model result
    pub result: Result<Decimal, ValuationError>,
}

struct AbandonedCall {
    instrument_id: InstrumentId,
    base_version: Version,
    consumed: Vec<ConsumedInput>,
    observation_version: Option<Version>,
    handle: JoinHandle<Result<Decimal, ValuationError>>,
}

/// Uniform, bounded access to the valuation library.
pub(crate) struct ValuationAdapter {
    model: Arc<dyn ValuationModel>,
    workers: Semaphore,
    timeout: Duration,
    abandoned: Mutex<Vec<AbandonedCall>>,
}

impl ValuationAdapter {
    /// Create an adapter with `workers` concurrent calls of at most `timeout` each.
    pub fn new(model: Arc<dyn ValuationModel>, workers: usize, timeout: Duration) -> Self {
        Self {
            model,
            workers: Semaphore::new(workers.max(1)),
            timeout,
            abandoned: Mutex::new(Vec::new()),
        }
    }

    /// Price one instrument.
    ///
    /// Abandoned calls keep running on the blocking pool but no longer count
    /// against the worker slots.
    pub async fn evaluate(&self, request: ValuationRequest) -> Result<Decimal, ValuationError> {
        let started = Instant::now();
        let deadline = started + self.timeout;

        let permit = match timeout_at(deadline, self.workers.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ValuationError::numerical("valuation worker pool closed")),
            Err(_) => {
                tracing::warn!(
                    instrument = %request.instrument.id,
                    budget_ms = self.budget_ms(),
                    "No valuation worker free before timeout"
                );
                return Err(ValuationError::timeout(self.budget_ms()));
            }
        };

        let model = Arc::clone(&self.model);
        let instrument = Arc::clone(&request.instrument);
        let resolved = request.prepared.resolved.clone();
        let mut handle =
            tokio::task::spawn_blocking(move || model.price(&instrument, &resolved));

        let outcome = timeout_at(deadline, &mut handle).await;
        drop(permit);

        match outcome {
            Ok(Ok(result)) => {
                tracing::trace!(
                    instrument = %request.instrument.id,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "Valuation finished"
                );
                result
            }
            Ok(Err(join_error)) => Err(ValuationError::numerical(format!(
                "valuation task failed: {}",
                join_error
            ))),
            Err(_) => {
                tracing::warn!(
                    instrument = %request.instrument.id,
                    budget_ms = self.budget_ms(),
                    "Valuation timed out; abandoning worker"
                );
                self.abandoned.lock().push(AbandonedCall {
                    instrument_id: request.instrument.id.clone(),
                    base_version: request.base_version,
                    consumed: request.prepared.consumed,
                    observation_version: request.prepared.observation_version,
                    handle,
                });
                Err(ValuationError::timeout(self.budget_ms()))
            }
        }
    }

    fn budget_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Returns true if timed-out calls are still outstanding.
    pub fn has_abandoned(&self) -> bool {
        !self.abandoned.lock().is_empty()
    }

    /// Collect the results of abandoned calls that have since finished.
    pub async fn take_late_results(&self) -> Vec<LateResult> {
        let finished: Vec<AbandonedCall> = {
            let mut abandoned = self.abandoned.lock();
            let (done, pending): (Vec<_>, Vec<_>) = abandoned
                .drain(..)
                .partition(|call| call.handle.is_finished());
            *abandoned = pending;
            done
        };

        let mut results = Vec::with_capacity(finished.len());
        for call in finished {
            let result = match call.handle.await {
                Ok(result) => result,
                Err(join_error) => Err(ValuationError::numerical(format!(
                    "valuation task failed: {}",
                    join_error
                ))),
            };
            results.push(LateResult {
                instrument_id: call.instrument_id,
                base_version: call.base_version,
                consumed: call.consumed,
                observation_version: call.observation_version,
                result,
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use strata_traits::instrument::InstrumentKind;
    use strata_traits::pricing::ResolvedInputs;

    struct SlowModel(Duration);

    impl ValuationModel for SlowModel {
        fn price(
            &self,
            _instrument: &Instrument,
            _inputs: &ResolvedInputs,
        ) -> Result<Decimal, ValuationError> {
            std::thread::sleep(self.0);
            Ok(dec!(42))
        }
    }

    fn request() -> ValuationRequest {
        ValuationRequest {
            instrument: Arc::new(Instrument::new("Q1", InstrumentKind::Equity)),
            prepared: PreparedInputs {
                resolved: ResolvedInputs::empty(Utc::now()),
                consumed: vec![],
                observation_version: Some(Version(1)),
            },
            base_version: Version::ZERO,
        }
    }

    #[tokio::test]
    async fn test_fast_call_returns_price() {
        let adapter = ValuationAdapter::new(
            Arc::new(SlowModel(Duration::ZERO)),
            2,
            Duration::from_millis(500),
        );
        assert_eq!(adapter.evaluate(request()).await, Ok(dec!(42)));
        assert!(!adapter.has_abandoned());
    }

    #[tokio::test]
    async fn test_timeout_is_reported_and_late_result_collected() {
        let adapter = ValuationAdapter::new(
            Arc::new(SlowModel(Duration::from_millis(100))),
            1,
            Duration::from_millis(10),
        );

        let err = adapter.evaluate(request()).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(adapter.has_abandoned());

        tokio::time::sleep(Duration::from_millis(250)).await;
        let late = adapter.take_late_results().await;
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].result, Ok(dec!(42)));
        assert_eq!(late[0].observation_version, Some(Version(1)));
        assert!(!adapter.has_abandoned());
    }

    struct HangsOnce {
        hang: Mutex<bool>,
    }

    impl ValuationModel for HangsOnce {
        fn price(
            &self,
            _instrument: &Instrument,
            _inputs: &ResolvedInputs,
        ) -> Result<Decimal, ValuationError> {
            let hang = std::mem::replace(&mut *self.hang.lock(), false);
            if hang {
                std::thread::sleep(Duration::from_millis(400));
            }
            Ok(dec!(7))
        }
    }

    #[tokio::test]
    async fn test_abandoned_call_releases_worker_slot() {
        let adapter = ValuationAdapter::new(
            Arc::new(HangsOnce {
                hang: Mutex::new(true),
            }),
            1,
            Duration::from_millis(30),
        );

        assert!(adapter.evaluate(request()).await.unwrap_err().is_timeout());

        let started = Instant::now();
        assert_eq!(adapter.evaluate(request()).await, Ok(dec!(7)));
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(adapter.workers.available_permits(), 1);
    }
}

//! Dirty-set scheduler.
//!
//! The scheduler is the single consumer of the ingestion queue and the
//! single writer of the price cache. It runs an explicit state machine:
//!
//! ```text
//! Idle -> Collecting -> Expanding -> Dispatching <-> Settling -> Idle
//! ```
//!
//! - **Collecting**: apply queued events to observations and mark the
//!   affected instruments dirty, until the collection window elapses or the
//!   pending-mark threshold is reached.
//! - **Expanding**: drain the pending marks against one registry snapshot,
//!   expand them through dependents, mark Fresh records Stale and split the
//!   expansion into topological batches.
//! - **Dispatching**: value every instrument of a batch in parallel.
//! - **Settling**: write the batch's records, publish them, then move to the
//!   next batch.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinSet;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, error, info, warn};

use strata_traits::config::EngineConfig;
use strata_traits::ids::{InstrumentId, Version};
use strata_traits::market_data::MarketEvent;
use strata_traits::output::{alert_types, AlertSeverity};
use strata_traits::pricing::{
    ConsumedInput, FailureReason, PriceRecord, PriceStatus, ValuationError,
};

use crate::cache::PriceCache;
use crate::context::{CalculationContext, Resolution};
use crate::graph::{self, DirtySet};
use crate::publisher::{AlertGateway, PublisherGateway};
use crate::registry::{Registry, RegistrySnapshot};
use crate::stats::StatsCounters;
use crate::valuation::{LateResult, ValuationAdapter, ValuationRequest};

// =============================================================================
// STATE
// =============================================================================

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Waiting for work
    Idle,
    /// Applying events and accumulating dirty marks
    Collecting,
    /// Draining marks and computing batches
    Expanding,
    /// Valuing a batch
    Dispatching,
    /// Committing and publishing a batch
    Settling,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Collecting => "collecting",
            SchedulerState::Expanding => "expanding",
            SchedulerState::Dispatching => "dispatching",
            SchedulerState::Settling => "settling",
        };
        write!(f, "{}", name)
    }
}

/// Summary of one scheduling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Cycle number
    pub cycle: u64,
    /// Registry version the cycle ran against
    pub registry_version: u64,
    /// Events taken from the queue at cycle start
    pub events_drained: usize,
    /// Dirty marks drained
    pub marks: usize,
    /// Instruments in the expansion
    pub expanded: usize,
    /// Number of batches
    pub batches: usize,
    /// Instruments priced successfully
    pub priced: usize,
    /// Instruments whose valuation failed
    pub failed: usize,
    /// Instruments failed because a dependency was Failed
    pub blocked: usize,
    /// Records delivered to the sink
    pub published: usize,
    /// Late results applied after a timeout
    pub late_accepted: usize,
}

struct Outcome {
    instrument_id: InstrumentId,
    consumed: Vec<ConsumedInput>,
    observation_version: Option<Version>,
    result: Result<Decimal, FailureReason>,
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Shared collaborators of a scheduler.
pub(crate) struct SchedulerParts {
    pub config: EngineConfig,
    pub registry: Arc<Registry>,
    pub dirty: Arc<DirtySet>,
    pub cache: Arc<PriceCache>,
    pub adapter: ValuationAdapter,
    pub publisher: PublisherGateway,
    pub alerts: AlertGateway,
    pub stats: Arc<StatsCounters>,
    pub events: mpsc::Receiver<MarketEvent>,
}

pub(crate) struct Scheduler {
    config: EngineConfig,
    registry: Arc<Registry>,
    dirty: Arc<DirtySet>,
    cache: Arc<PriceCache>,
    adapter: ValuationAdapter,
    publisher: PublisherGateway,
    alerts: AlertGateway,
    stats: Arc<StatsCounters>,

    /// Ingestion queue; held by whoever is collecting.
    events: tokio::sync::Mutex<mpsc::Receiver<MarketEvent>>,

    /// Wakes an idle loop when marks are recorded outside the queue.
    wake: Notify,

    state: Mutex<SchedulerState>,

    /// Instruments with a standing configuration alert.
    standing_alerts: Mutex<HashSet<InstrumentId>>,

    /// One cycle at a time.
    cycle_lock: tokio::sync::Mutex<()>,

    cycle_counter: AtomicU64,
}

impl Scheduler {
    pub fn new(parts: SchedulerParts) -> Self {
        Self {
            config: parts.config,
            registry: parts.registry,
            dirty: parts.dirty,
            cache: parts.cache,
            adapter: parts.adapter,
            publisher: parts.publisher,
            alerts: parts.alerts,
            stats: parts.stats,
            events: tokio::sync::Mutex::new(parts.events),
            wake: Notify::new(),
            state: Mutex::new(SchedulerState::Idle),
            standing_alerts: Mutex::new(HashSet::new()),
            cycle_lock: tokio::sync::Mutex::new(()),
            cycle_counter: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock() = state;
    }

    /// Wake the loop after recording a mark directly.
    pub fn notify(&self) {
        self.wake.notify_one();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PriceRecord>> {
        self.publisher.subscribe()
    }

    pub async fn flush(&self) -> crate::error::EngineResult<()> {
        self.publisher.flush().await
    }

    /// Instruments with a standing configuration alert, sorted.
    pub fn standing_alerts(&self) -> Vec<InstrumentId> {
        let mut ids: Vec<_> = self.standing_alerts.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    // -------------------------------------------------------------------------
    // Collecting
    // -------------------------------------------------------------------------

    /// Apply one event. Returns true if it marked an instrument dirty.
    fn accept_event(&self, event: MarketEvent) -> bool {
        if !self.registry.snapshot().contains(&event.instrument_id) {
            StatsCounters::incr(&self.stats.events_unknown);
            warn!(
                instrument = %event.instrument_id,
                source = %event.source,
                "Event for unregistered instrument discarded"
            );
            return false;
        }

        match self.cache.observations().accept(&event) {
            Ok(Some(version)) => {
                StatsCounters::incr(&self.stats.events_accepted);
                self.dirty.mark_dirty(event.instrument_id, version);
                true
            }
            Err(e) => {
                StatsCounters::incr(&self.stats.events_invalid);
                warn!(
                    instrument = %event.instrument_id,
                    source = %event.source,
                    sequence = event.sequence,
                    error = %e,
                    "Invalid event discarded"
                );
                false
            }
            Ok(None) => {
                StatsCounters::incr(&self.stats.events_out_of_order);
                debug!(
                    instrument = %event.instrument_id,
                    source = %event.source,
                    sequence = event.sequence,
                    "Duplicate or out-of-order event discarded"
                );
                false
            }
        }
    }

    /// Apply everything already queued, unless a collector holds the queue.
    async fn drain_queue(&self) -> usize {
        let Ok(mut events) = self.events.try_lock() else {
            return 0;
        };
        let mut drained = 0;
        while let Ok(event) = events.try_recv() {
            self.accept_event(event);
            drained += 1;
        }
        drained
    }

    /// Wait for work, then collect until the window closes or enough marks
    /// are pending. Returns false when the loop should stop.
    async fn collect(&self, shutdown: &mut broadcast::Receiver<()>) -> bool {
        let mut events = self.events.lock().await;
        let window = self.config.collection_window();

        if self.dirty.pending_len() == 0 {
            let poll_late = self.adapter.has_abandoned();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.accept_event(event);
                    }
                    None => return false,
                },
                _ = self.wake.notified() => {}
                _ = sleep(window), if poll_late => {}
                _ = shutdown.recv() => return false,
            }
        }

        self.set_state(SchedulerState::Collecting);
        let deadline = Instant::now() + window;

        while self.dirty.pending_len() < self.config.max_pending_marks {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.accept_event(event);
                    }
                    None => return false,
                },
                _ = sleep_until(deadline) => break,
                _ = shutdown.recv() => return false,
            }
        }

        true
    }

    /// Scheduler loop. On shutdown, runs one last cycle over whatever was
    /// already accepted or queued.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(engine = %self.config.name, "Scheduler started");

        loop {
            self.set_state(SchedulerState::Idle);
            let keep_running = self.collect(&mut shutdown).await;
            let report = self.run_cycle().await;

            if report.expanded > 0 {
                debug!(
                    cycle = report.cycle,
                    expanded = report.expanded,
                    batches = report.batches,
                    priced = report.priced,
                    failed = report.failed,
                    blocked = report.blocked,
                    "Cycle complete"
                );
            }

            if !keep_running {
                break;
            }
        }

        self.set_state(SchedulerState::Idle);
        info!(engine = %self.config.name, "Scheduler stopped");
    }

    // -------------------------------------------------------------------------
    // Cycle
    // -------------------------------------------------------------------------

    /// Run one full cycle over the currently pending marks.
    pub async fn run_cycle(self: &Arc<Self>) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;

        let events_drained = self.drain_queue().await;
        let cycle = self.cycle_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut report = CycleReport {
            cycle,
            events_drained,
            ..Default::default()
        };

        // Late results first, so the dependents they mark join this cycle.
        self.set_state(SchedulerState::Settling);
        let late_accepted = self.settle_late_results(&mut report).await;
        report.late_accepted = late_accepted;

        self.set_state(SchedulerState::Expanding);
        let marks = self.dirty.drain();
        report.marks = marks.len();
        if marks.is_empty() {
            self.set_state(SchedulerState::Idle);
            return report;
        }

        let snapshot = self.registry.snapshot();
        report.registry_version = snapshot.version();

        let roots = marks
            .iter()
            .map(|m| &m.instrument_id)
            .filter(|id| snapshot.contains(id));
        let expanded: BTreeSet<InstrumentId> = graph::expand(&snapshot, roots);
        for id in &expanded {
            self.cache.mark_stale(id);
        }
        report.expanded = expanded.len();

        let batches = match graph::topological_batches(&snapshot, &expanded) {
            Ok(batches) => batches,
            Err(e) => {
                error!(cycle, error = %e, "Cannot order dirty instruments");
                self.set_state(SchedulerState::Idle);
                return report;
            }
        };
        report.batches = batches.len();

        for batch in batches {
            self.set_state(SchedulerState::Dispatching);
            let outcomes = self.dispatch(&snapshot, batch).await;

            self.set_state(SchedulerState::Settling);
            for outcome in outcomes {
                self.settle(outcome, &mut report).await;
            }
        }

        let standing = self.standing_alerts.lock().len();
        if standing > 0 {
            debug!(cycle, standing, "Configuration alerts standing");
        }

        StatsCounters::incr(&self.stats.cycles);
        self.set_state(SchedulerState::Idle);
        report
    }

    /// Value one batch in parallel. Outcomes come back sorted by instrument.
    async fn dispatch(
        self: &Arc<Self>,
        snapshot: &RegistrySnapshot,
        batch: Vec<InstrumentId>,
    ) -> Vec<Outcome> {
        let ctx = CalculationContext::new(&self.cache);
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut tasks = JoinSet::new();

        for id in batch {
            let Some(instrument) = snapshot.get(&id).cloned() else {
                continue;
            };

            match ctx.resolve(&instrument) {
                Resolution::Blocked {
                    dependency,
                    consumed,
                } => outcomes.push(Outcome {
                    instrument_id: id,
                    consumed,
                    observation_version: None,
                    result: Err(FailureReason::DependencyFailed(dependency)),
                }),
                Resolution::Ready(prepared) => {
                    let consumed = prepared.consumed.clone();
                    let observation_version = prepared.observation_version;
                    let request = ValuationRequest {
                        base_version: self.cache.current_version(&id),
                        instrument,
                        prepared,
                    };
                    let scheduler = Arc::clone(self);
                    tasks.spawn(async move {
                        let result = scheduler
                            .adapter
                            .evaluate(request)
                            .await
                            .map_err(FailureReason::Valuation);
                        Outcome {
                            instrument_id: id,
                            consumed,
                            observation_version,
                            result,
                        }
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "Valuation task aborted"),
            }
        }

        outcomes.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        outcomes
    }

    // -------------------------------------------------------------------------
    // Settling
    // -------------------------------------------------------------------------

    async fn settle(&self, outcome: Outcome, report: &mut CycleReport) {
        let id = outcome.instrument_id;
        let previous = self.cache.try_get(&id);
        let (previous_version, previous_price) = previous
            .as_ref()
            .map(|r| (r.version, r.price))
            .unwrap_or((Version::ZERO, None));

        let record = match outcome.result {
            Ok(price) => {
                report.priced += 1;
                StatsCounters::incr(&self.stats.valuations);
                self.clear_standing_alert(&id).await;

                let version = previous_version.next();
                debug!(instrument = %id, %version, %price, "Priced");
                PriceRecord {
                    instrument_id: id,
                    price: Some(price),
                    version,
                    inputs: outcome.consumed,
                    observation_version: outcome.observation_version,
                    computed_at: Utc::now(),
                    status: PriceStatus::Fresh,
                    failure: None,
                }
            }
            Err(reason) => {
                match &reason {
                    FailureReason::DependencyFailed(dependency) => {
                        report.blocked += 1;
                        StatsCounters::incr(&self.stats.blocked);
                        debug!(
                            instrument = %id,
                            dependency = %dependency,
                            "Dependency failed; valuation skipped"
                        );
                    }
                    FailureReason::Valuation(error) => {
                        report.failed += 1;
                        StatsCounters::incr(&self.stats.valuation_failures);
                        if error.is_configuration() {
                            self.raise_standing_alert(&id, error).await;
                        } else {
                            warn!(instrument = %id, error = %error, "Valuation failed");
                        }
                    }
                }

                PriceRecord {
                    instrument_id: id,
                    price: previous_price,
                    version: previous_version,
                    inputs: outcome.consumed,
                    observation_version: outcome.observation_version,
                    computed_at: Utc::now(),
                    status: PriceStatus::Failed,
                    failure: Some(reason),
                }
            }
        };

        let record = self.cache.put(record);
        if (record.is_fresh() || self.config.publish_failures) && self.publish(&record).await {
            report.published += 1;
        }
    }

    async fn publish(&self, record: &Arc<PriceRecord>) -> bool {
        match self.publisher.publish(record).await {
            Ok(()) => {
                StatsCounters::incr(&self.stats.published);
                true
            }
            Err(e) => {
                StatsCounters::incr(&self.stats.publish_dropped);
                warn!(
                    instrument = %record.instrument_id,
                    version = %record.version,
                    error = %e,
                    "Price record dropped"
                );
                self.alerts
                    .raise(
                        AlertSeverity::Warning,
                        alert_types::PUBLISH_DROPPED,
                        Some(&record.instrument_id),
                        e.to_string(),
                    )
                    .await;
                false
            }
        }
    }

    async fn raise_standing_alert(&self, id: &InstrumentId, error: &ValuationError) {
        let first = self.standing_alerts.lock().insert(id.clone());
        if first {
            error!(instrument = %id, error = %error, "Configuration alert raised");
            self.alerts
                .raise(
                    AlertSeverity::Error,
                    alert_types::MODEL_UNSUPPORTED,
                    Some(id),
                    error.to_string(),
                )
                .await;
        } else {
            debug!(instrument = %id, error = %error, "Configuration alert still standing");
        }
    }

    async fn clear_standing_alert(&self, id: &InstrumentId) {
        let cleared = self.standing_alerts.lock().remove(id);
        if cleared {
            info!(instrument = %id, "Configuration alert cleared");
            self.alerts
                .raise(
                    AlertSeverity::Info,
                    alert_types::MODEL_RECOVERED,
                    Some(id),
                    format!("{} priced successfully", id),
                )
                .await;
        }
    }

    // -------------------------------------------------------------------------
    // Late results
    // -------------------------------------------------------------------------

    async fn settle_late_results(&self, report: &mut CycleReport) -> usize {
        let mut accepted = 0;

        for late in self.adapter.take_late_results().await {
            let price = match (&late.result, self.late_result_applies(&late)) {
                (Ok(price), true) => *price,
                _ => {
                    StatsCounters::incr(&self.stats.late_discarded);
                    debug!(instrument = %late.instrument_id, "Late valuation result discarded");
                    continue;
                }
            };

            let version = late.base_version.next();
            let record = self.cache.put(PriceRecord {
                instrument_id: late.instrument_id.clone(),
                price: Some(price),
                version,
                inputs: late.consumed,
                observation_version: late.observation_version,
                computed_at: Utc::now(),
                status: PriceStatus::Fresh,
                failure: None,
            });
            accepted += 1;
            StatsCounters::incr(&self.stats.late_accepted);
            info!(instrument = %late.instrument_id, %version, "Late valuation result applied");

            for dependent in self.registry.dependents(&late.instrument_id) {
                self.dirty.mark_dirty(dependent, version);
            }

            if self.publish(&record).await {
                report.published += 1;
            }
        }

        accepted
    }

    /// A late result applies only if nothing happened to the instrument
    /// since it timed out.
    fn late_result_applies(&self, late: &LateResult) -> bool {
        let Some(current) = self.cache.try_get(&late.instrument_id) else {
            return false;
        };
        let Ok(instrument) = self.registry.lookup(&late.instrument_id) else {
            return false;
        };

        let timed_out = matches!(
            &current.failure,
            Some(FailureReason::Valuation(e)) if e.is_timeout()
        );
        let same_inputs = late.consumed.len() == instrument.inputs.len()
            && late
                .consumed
                .iter()
                .zip(&instrument.inputs)
                .all(|(c, declared)| {
                    c.instrument_id == *declared
                        && self.cache.current_version(declared) == c.version
                });

        timed_out
            && current.version == late.base_version
            && same_inputs
            && late.observation_version == self.cache.observations().version(&late.instrument_id)
            && !self.dirty.is_pending(&late.instrument_id)
    }
}

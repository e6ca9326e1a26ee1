//! # Strata Engine
//!
//! The incremental pricing recomputation engine.
//!
//! This crate provides:
//! - [`Registry`]: Instrument definitions and dependency edges, copy-on-write
//! - [`graph`]: Dirty marks, transitive expansion and topological batching
//! - [`PriceCache`]: Last-known-good prices and raw market observations
//! - [`PricingEngine`]: Facade wiring the scheduler, valuation adapter and
//!   publisher gateway together
//!
//! ## Architecture
//!
//! ```text
//! MarketEvent ─> IngestHandle ─> bounded queue ─> Scheduler
//!                                                   │ marks dirty
//!                                                   v
//!                          Registry snapshot ─> expand ─> batches
//!                                                   │ per batch, in parallel
//!                                                   v
//!                     PriceCache ─> ValuationAdapter (worker pool, timeout)
//!                                                   │ settle
//!                                                   v
//!                                PriceCache ─> PublisherGateway ─> PriceSink
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let engine = PricingEngineBuilder::new()
//!     .with_config(EngineConfig::default())
//!     .with_model(Arc::new(ModelRouter::new()))
//!     .with_sink(price_sink)
//!     .with_alerts(alert_sink)
//!     .build()?;
//!
//! engine.register_all(instruments)?;
//! engine.start()?;
//! engine.ingest(MarketEvent::last("Q1", dec!(100), 1))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod cache;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod publisher;
pub mod registry;
pub mod scheduler;
pub mod stats;

mod context;
mod valuation;

// Re-exports
pub use builder::PricingEngineBuilder;
pub use cache::{ObservationStore, PriceCache};
pub use error::{EngineError, EngineResult, RegistryError};
pub use graph::{DirtyMark, DirtySet};
pub use ingest::IngestHandle;
pub use registry::{Registry, RegistrySnapshot};
pub use scheduler::{CycleReport, SchedulerState};
pub use stats::EngineStats;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use strata_traits::config::EngineConfig;
use strata_traits::ids::InstrumentId;
use strata_traits::instrument::Instrument;
use strata_traits::market_data::{MarketEvent, Observation};
use strata_traits::output::{AlertSink, PriceSink};
use strata_traits::pricing::{PriceRecord, ValuationModel};

use crate::publisher::{AlertGateway, PublisherGateway};
use crate::scheduler::{Scheduler, SchedulerParts};
use crate::stats::StatsCounters;
use crate::valuation::ValuationAdapter;

/// The main pricing engine.
pub struct PricingEngine {
    /// Engine configuration
    config: EngineConfig,

    /// Instrument registry
    registry: Arc<Registry>,

    /// Pending dirty marks
    dirty: Arc<DirtySet>,

    /// Prices and observations
    cache: Arc<PriceCache>,

    /// Dirty-set scheduler
    scheduler: Arc<Scheduler>,

    /// Inbound queue producer
    ingest: IngestHandle,

    /// Counters
    stats: Arc<StatsCounters>,

    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,

    /// Scheduler loop, once started
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PricingEngine {
    /// Create a new pricing engine. Prefer [`PricingEngineBuilder`].
    pub fn new(
        config: EngineConfig,
        model: Arc<dyn ValuationModel>,
        sink: Arc<dyn PriceSink>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (events_tx, events_rx) = mpsc::channel(config.queue_capacity.max(1));

        let registry = Arc::new(Registry::new());
        let dirty = Arc::new(DirtySet::new());
        let cache = Arc::new(PriceCache::new());
        let stats = Arc::new(StatsCounters::default());

        let scheduler = Arc::new(Scheduler::new(SchedulerParts {
            config: config.clone(),
            registry: Arc::clone(&registry),
            dirty: Arc::clone(&dirty),
            cache: Arc::clone(&cache),
            adapter: ValuationAdapter::new(
                model,
                config.worker_threads,
                config.valuation_timeout(),
            ),
            publisher: PublisherGateway::new(
                sink,
                config.publish_retry.clone(),
                config.update_channel_capacity,
            ),
            alerts: AlertGateway::new(alerts),
            stats: Arc::clone(&stats),
            events: events_rx,
        }));

        Self {
            ingest: IngestHandle::new(events_tx, Arc::clone(&stats)),
            config,
            registry,
            dirty,
            cache,
            scheduler,
            stats,
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Registry administration
    // =========================================================================

    /// Register or replace one instrument.
    ///
    /// Returns the new registry version.
    pub fn register(&self, instrument: Instrument) -> EngineResult<u64> {
        self.register_all(vec![instrument])
    }

    /// Register a batch of instruments atomically.
    pub fn register_all(&self, instruments: Vec<Instrument>) -> EngineResult<u64> {
        let ids: Vec<InstrumentId> = instruments.iter().map(|i| i.id.clone()).collect();
        let version = self.registry.register_all(instruments)?;

        let snapshot = self.registry.snapshot();
        let mut marked = false;
        for id in ids {
            let priceable = snapshot.get(&id).is_some_and(|i| !i.is_leaf())
                || self.cache.observations().version(&id).is_some();
            if priceable {
                marked |= self.dirty.mark_dirty(id.clone(), self.cache.current_version(&id));
            }
        }
        if marked {
            self.scheduler.notify();
        }

        info!(registry_version = version, instruments = snapshot.len(), "Instruments registered");
        Ok(version)
    }

    /// Remove an instrument nothing depends on, with its price and observation.
    pub fn deregister(&self, id: &InstrumentId) -> EngineResult<Arc<Instrument>> {
        let removed = self.registry.deregister(id)?;
        self.cache.remove(id);
        self.cache.observations().remove(id);
        info!(instrument = %id, "Instrument deregistered");
        Ok(removed)
    }

    /// Registered definition.
    pub fn lookup(&self, id: &InstrumentId) -> EngineResult<Arc<Instrument>> {
        Ok(self.registry.lookup(id)?)
    }

    /// Current registry snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.registry.snapshot()
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Enqueue a market event; `Backpressure` if the queue is full.
    pub fn ingest(&self, event: MarketEvent) -> EngineResult<()> {
        self.ingest.ingest(event)
    }

    /// Cloneable handle for delivery threads.
    pub fn ingest_handle(&self) -> IngestHandle {
        self.ingest.clone()
    }

    /// Force revaluation of an instrument and its dependents.
    pub fn invalidate(&self, id: &InstrumentId) -> EngineResult<()> {
        self.registry.lookup(id)?;
        self.dirty
            .mark_dirty(id.clone(), self.cache.current_version(id));
        self.scheduler.notify();
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Last price record of an instrument.
    pub fn price(&self, id: &InstrumentId) -> EngineResult<Arc<PriceRecord>> {
        self.cache.get(id)
    }

    /// Every price record, sorted by instrument.
    pub fn prices(&self) -> Vec<Arc<PriceRecord>> {
        self.cache.records()
    }

    /// Current market observation of an instrument.
    pub fn observation(&self, id: &InstrumentId) -> Option<Observation> {
        self.cache.observations().get(id)
    }

    /// Returns true if the price of `id` is not Fresh or its inputs moved on.
    pub fn is_stale(&self, id: &InstrumentId) -> EngineResult<bool> {
        self.cache.is_stale(id, &self.registry.snapshot())
    }

    /// Subscribe to every settled record.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PriceRecord>> {
        self.scheduler.subscribe()
    }

    /// Counters.
    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    /// Scheduler state.
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Instruments with a standing configuration alert.
    pub fn standing_alerts(&self) -> Vec<InstrumentId> {
        self.scheduler.standing_alerts()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the scheduler loop. Must be called inside a Tokio runtime.
    pub fn start(&self) -> EngineResult<()> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(EngineError::ConfigError("engine already started".into()));
        }

        info!(
            engine = %self.config.name,
            window_ms = self.config.collection_window_ms,
            max_pending = self.config.max_pending_marks,
            workers = self.config.worker_threads,
            "Starting pricing engine"
        );

        let scheduler = Arc::clone(&self.scheduler);
        let shutdown_rx = self.shutdown_tx.subscribe();
        *task = Some(tokio::spawn(scheduler.run(shutdown_rx)));
        Ok(())
    }

    /// Run one cycle over whatever is pending. Used when the loop is not
    /// started (tools, tests) or to force progress.
    pub async fn run_cycle(&self) -> CycleReport {
        self.scheduler.run_cycle().await
    }

    /// Stop the loop after a final cycle and flush the sink.
    pub async fn shutdown(&self) -> EngineResult<()> {
        info!(engine = %self.config.name, "Shutting down pricing engine");
        let _ = self.shutdown_tx.send(());

        let task = self.task.lock().take();
        match task {
            Some(handle) => handle
                .await
                .map_err(|e| EngineError::Internal(format!("scheduler task failed: {}", e)))?,
            None => {
                self.run_cycle().await;
            }
        }

        self.scheduler.flush().await?;
        info!(stats = ?self.stats(), "Pricing engine stopped");
        Ok(())
    }
}

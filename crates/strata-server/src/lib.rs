//! # Strata Server
//!
//! Runs the pricing engine as a process:
//! - Loads instrument definitions and registers them
//! - Replays a CSV market event file into the engine
//! - Writes published price records as JSON lines
//! - Logs alerts (and optionally writes them to a file)
//! - Stops on the shutdown signal, or after the replay when configured

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alerts;
pub mod config;
pub mod error;
pub mod replay;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use strata_engine::{EngineStats, PricingEngine, PricingEngineBuilder};
use strata_ext_file::{load_instruments, CsvEventSource, FileAlertSink, FilePriceSink};
use strata_ext_json::JsonCodec;
use strata_quant::ModelRouter;
use strata_traits::output::AlertSink;

pub use alerts::LoggingAlertSink;
pub use config::ServerConfig;
pub use error::ServerError;
pub use replay::{replay, ReplaySummary};

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Replay outcome; `None` when nothing was replayed or the run was interrupted
    pub replay: Option<ReplaySummary>,
    /// Engine counters after shutdown
    pub stats: EngineStats,
    /// Price records written to the output file
    pub records_written: u64,
}

/// Pricing server.
pub struct Server {
    config: ServerConfig,
    engine: Arc<PricingEngine>,
    sink: Arc<FilePriceSink<JsonCodec>>,
}

impl Server {
    /// Open the outputs, build the engine and register the instruments.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let sink = Arc::new(FilePriceSink::open(&config.output_file, JsonCodec::new()).await?);

        let alerts: Arc<dyn AlertSink> = match &config.alerts_file {
            Some(path) => {
                let file = FileAlertSink::open(path, JsonCodec::new()).await?;
                Arc::new(LoggingAlertSink::forwarding(Arc::new(file)))
            }
            None => Arc::new(LoggingAlertSink::new()),
        };

        let engine = PricingEngineBuilder::new()
            .with_config(config.engine.clone())
            .with_model(Arc::new(ModelRouter::new()))
            .with_sink(sink.clone())
            .with_alerts(alerts)
            .build()?;

        let instruments = load_instruments(&config.instruments_file)?;
        let count = instruments.len();
        let version = engine.register_all(instruments)?;
        info!(
            instruments = count,
            registry_version = version,
            file = %config.instruments_file,
            "Registered instruments"
        );

        Ok(Self {
            config,
            engine: Arc::new(engine),
            sink,
        })
    }

    /// The running engine.
    pub fn engine(&self) -> &Arc<PricingEngine> {
        &self.engine
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start the engine, replay the event file and run until `shutdown`
    /// resolves (or until the replay ends, with `exit_after_replay`).
    /// The engine always completes a final cycle and flushes before this
    /// returns.
    pub async fn run<F>(&self, shutdown: F) -> Result<RunSummary, ServerError>
    where
        F: Future<Output = ()>,
    {
        let events = match &self.config.events_file {
            Some(path) => {
                let source = CsvEventSource::new(path)?;
                info!(file = %path, events = source.len(), "Replaying market events");
                Some(source.into_events())
            }
            None => None,
        };

        self.engine.start()?;
        tokio::pin!(shutdown);

        let mut interrupted = false;
        let outcome = match events {
            Some(events) => {
                let handle = self.engine.ingest_handle();
                let retry = Duration::from_millis(self.config.replay_retry_ms);
                tokio::select! {
                    result = replay(&handle, events, retry) => result.map(Some),
                    _ = &mut shutdown => {
                        interrupted = true;
                        Ok(None)
                    }
                }
            }
            None => Ok(None),
        };

        if outcome.is_ok() && !interrupted && !self.config.exit_after_replay {
            info!("Waiting for shutdown signal");
            shutdown.await;
        }

        self.engine.shutdown().await?;
        let replay = outcome?;

        Ok(RunSummary {
            replay,
            stats: self.engine.stats(),
            records_written: self.sink.written(),
        })
    }
}

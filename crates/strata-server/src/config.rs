//! Server configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use strata_traits::config::EngineConfig;

/// Server configuration.
///
/// ```toml
/// instruments_file = "data/instruments.json"
/// events_file = "data/events.csv"
/// output_file = "output/prices.jsonl"
/// exit_after_replay = true
///
/// [engine]
/// collection_window_ms = 50
/// worker_threads = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Instrument definitions (JSON array)
    #[serde(default = "default_instruments_file")]
    pub instruments_file: String,

    /// Market events to replay (CSV); nothing is replayed when absent
    pub events_file: Option<String>,

    /// Price records, one JSON object per line
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Alerts, one JSON object per line, in addition to the log
    pub alerts_file: Option<String>,

    /// Stop once the replay has been fully ingested and priced
    #[serde(default)]
    pub exit_after_replay: bool,

    /// Pause before re-offering an event refused with backpressure
    #[serde(default = "default_replay_retry_ms")]
    pub replay_retry_ms: u64,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_instruments_file() -> String {
    "data/instruments.json".to_string()
}

fn default_output_file() -> String {
    "output/prices.jsonl".to_string()
}

fn default_replay_retry_ms() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instruments_file: default_instruments_file(),
            events_file: None,
            output_file: default_output_file(),
            alerts_file: None,
            exit_after_replay: false,
            replay_retry_ms: default_replay_retry_ms(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, std::io::Error> {
        toml::from_str(content).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

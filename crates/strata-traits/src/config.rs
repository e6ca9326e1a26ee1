//! Engine configuration.
//!
//! Configuration contains:
//! - Scheduler collection window and pending-mark threshold
//! - Ingestion queue and worker pool sizing
//! - Valuation timeout
//! - Publish retry policy
//!
//! Configuration does NOT contain:
//! - Instrument definitions (that's registry data)
//! - Market data values

use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// RETRY POLICY
// =============================================================================

/// Retry policy with exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    50
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = base_delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(delay_ms as u64)
    }
}

// =============================================================================
// ENGINE CONFIG
// =============================================================================

/// Pricing engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine name/identifier
    #[serde(default = "default_name")]
    pub name: String,

    /// Collecting window before a cycle starts
    #[serde(default = "default_collection_window_ms")]
    pub collection_window_ms: u64,

    /// Pending marks that end the collecting window early
    #[serde(default = "default_max_pending_marks")]
    pub max_pending_marks: usize,

    /// Capacity of the bounded ingestion queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Size of the valuation worker pool
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Per-call valuation timeout
    #[serde(default = "default_valuation_timeout_ms")]
    pub valuation_timeout_ms: u64,

    /// Publish Failed records as well as Fresh ones
    #[serde(default = "default_true")]
    pub publish_failures: bool,

    /// Retry policy for the price sink
    #[serde(default)]
    pub publish_retry: RetryConfig,

    /// Capacity of the in-process update broadcast
    #[serde(default = "default_update_channel_capacity")]
    pub update_channel_capacity: usize,
}

fn default_name() -> String {
    "strata-engine".to_string()
}

fn default_collection_window_ms() -> u64 {
    50
}

fn default_max_pending_marks() -> usize {
    500
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_worker_threads() -> usize {
    4
}

fn default_valuation_timeout_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

fn default_update_channel_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            collection_window_ms: default_collection_window_ms(),
            max_pending_marks: default_max_pending_marks(),
            queue_capacity: default_queue_capacity(),
            worker_threads: default_worker_threads(),
            valuation_timeout_ms: default_valuation_timeout_ms(),
            publish_failures: default_true(),
            publish_retry: RetryConfig::default(),
            update_channel_capacity: default_update_channel_capacity(),
        }
    }
}

impl EngineConfig {
    /// Collecting window as a duration.
    pub fn collection_window(&self) -> Duration {
        Duration::from_millis(self.collection_window_ms)
    }

    /// Valuation timeout as a duration.
    pub fn valuation_timeout(&self) -> Duration {
        Duration::from_millis(self.valuation_timeout_ms)
    }

    /// Checks that sizing parameters are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be > 0".to_string());
        }
        if self.worker_threads == 0 {
            return Err("worker_threads must be > 0".to_string());
        }
        if self.max_pending_marks == 0 {
            return Err("max_pending_marks must be > 0".to_string());
        }
        if self.update_channel_capacity == 0 {
            return Err("update_channel_capacity must be > 0".to_string());
        }
        if self.publish_retry.max_attempts == 0 {
            return Err("publish_retry.max_attempts must be > 0".to_string());
        }
        Ok(())
    }
}

//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Events applied to an observation
    pub events_accepted: u64,
    /// Events dropped as duplicates or out of order
    pub events_out_of_order: u64,
    /// Events for unregistered instruments
    pub events_unknown: u64,
    /// Events the observation refused (values out of range)
    pub events_invalid: u64,
    /// Events refused with Backpressure
    pub events_rejected: u64,
    /// Completed scheduling cycles
    pub cycles: u64,
    /// Successful valuations
    pub valuations: u64,
    /// Failed valuations (model errors and timeouts)
    pub valuation_failures: u64,
    /// Instruments failed because a dependency was Failed
    pub blocked: u64,
    /// Records delivered to the sink
    pub published: u64,
    /// Records dropped after exhausting retries
    pub publish_dropped: u64,
    /// Late results applied after a timeout
    pub late_accepted: u64,
    /// Late results discarded as superseded
    pub late_discarded: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub events_accepted: AtomicU64,
    pub events_out_of_order: AtomicU64,
    pub events_unknown: AtomicU64,
    pub events_invalid: AtomicU64,
    pub events_rejected: AtomicU64,
    pub cycles: AtomicU64,
    pub valuations: AtomicU64,
    pub valuation_failures: AtomicU64,
    pub blocked: AtomicU64,
    pub published: AtomicU64,
    pub publish_dropped: AtomicU64,
    pub late_accepted: AtomicU64,
    pub late_discarded: AtomicU64,
}

impl StatsCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        EngineStats {
            events_accepted: load(&self.events_accepted),
            events_out_of_order: load(&self.events_out_of_order),
            events_unknown: load(&self.events_unknown),
            events_invalid: load(&self.events_invalid),
            events_rejected: load(&self.events_rejected),
            cycles: load(&self.cycles),
            valuations: load(&self.valuations),
            valuation_failures: load(&self.valuation_failures),
            blocked: load(&self.blocked),
            published: load(&self.published),
            publish_dropped: load(&self.publish_dropped),
            late_accepted: load(&self.late_accepted),
            late_discarded: load(&self.late_discarded),
        }
    }
}

//! In-memory caches for the pricing engine.
//!
//! - [`PriceCache`]: last computed [`PriceRecord`] per instrument
//! - [`ObservationStore`]: aggregated raw market state per quoted instrument,
//!   with per-source sequence filtering
//!
//! Records are stored as `Arc<PriceRecord>` and replaced whole, so readers
//! never see a partially written record.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use strata_traits::ids::{InstrumentId, SourceId, Version};
use strata_traits::market_data::{MarketEvent, Observation, ObservationError};
use strata_traits::pricing::{PriceRecord, PriceStatus};

use crate::error::{EngineError, EngineResult};
use crate::registry::RegistrySnapshot;

// =============================================================================
// OBSERVATIONS
// =============================================================================

/// Raw market state built from accepted events.
#[derive(Default)]
pub struct ObservationStore {
    observations: DashMap<InstrumentId, Observation>,
    last_sequence: DashMap<(SourceId, InstrumentId), u64>,
}

impl ObservationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event if its sequence is newer than the last accepted one
    /// from the same source for the same instrument.
    ///
    /// Returns the new observation version, or `None` for duplicates and
    /// out-of-order replays. An event the observation refuses leaves both
    /// the observation and the sequence filter unchanged.
    pub fn accept(&self, event: &MarketEvent) -> Result<Option<Version>, ObservationError> {
        let key = (event.source.clone(), event.instrument_id.clone());
        let last = self.last_sequence.entry(key);
        if let Entry::Occupied(seen) = &last {
            if event.sequence <= *seen.get() {
                return Ok(None);
            }
        }

        let version = match self.observations.entry(event.instrument_id.clone()) {
            Entry::Occupied(mut observation) => observation.get_mut().apply(event)?,
            Entry::Vacant(slot) => {
                let mut observation = Observation::default();
                let version = observation.apply(event)?;
                slot.insert(observation);
                version
            }
        };
        last.insert(event.sequence);
        Ok(Some(version))
    }

    /// Current observation of an instrument.
    pub fn get(&self, id: &InstrumentId) -> Option<Observation> {
        self.observations.get(id).map(|o| o.clone())
    }

    /// Current observation version of an instrument.
    pub fn version(&self, id: &InstrumentId) -> Option<Version> {
        self.observations.get(id).map(|o| o.version)
    }

    /// Forget everything about an instrument.
    pub fn remove(&self, id: &InstrumentId) {
        self.observations.remove(id);
        self.last_sequence.retain(|(_, instrument), _| instrument != id);
    }

    /// Number of observed instruments.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Returns true if nothing has been observed.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

// =============================================================================
// PRICE CACHE
// =============================================================================

/// Last-known-good price per instrument and the versions it consumed.
///
/// Written only by the scheduler's settling step, never concurrently for
/// the same instrument.
#[derive(Default)]
pub struct PriceCache {
    records: DashMap<InstrumentId, Arc<PriceRecord>>,
    observations: ObservationStore,
}

impl PriceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last record of an instrument.
    pub fn get(&self, id: &InstrumentId) -> EngineResult<Arc<PriceRecord>> {
        self.try_get(id)
            .ok_or_else(|| EngineError::PriceNotFound(id.clone()))
    }

    /// Last record of an instrument, if any.
    pub fn try_get(&self, id: &InstrumentId) -> Option<Arc<PriceRecord>> {
        self.records.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Overwrite the record of an instrument.
    pub fn put(&self, record: PriceRecord) -> Arc<PriceRecord> {
        let record = Arc::new(record);
        self.records
            .insert(record.instrument_id.clone(), Arc::clone(&record));
        record
    }

    /// Own version of an instrument; zero if it never priced.
    pub fn current_version(&self, id: &InstrumentId) -> Version {
        self.records
            .get(id)
            .map(|r| r.version)
            .unwrap_or(Version::ZERO)
    }

    /// Replace a Fresh record by a Stale copy. Returns true if it changed.
    pub fn mark_stale(&self, id: &InstrumentId) -> bool {
        if let Some(mut entry) = self.records.get_mut(id) {
            if entry.status == PriceStatus::Fresh {
                let stale = Arc::new(entry.with_status(PriceStatus::Stale));
                *entry = stale;
                return true;
            }
        }
        false
    }

    /// Returns true if the record of `id` is not Fresh, or was computed from
    /// versions that are no longer current.
    pub fn is_stale(&self, id: &InstrumentId, snapshot: &RegistrySnapshot) -> EngineResult<bool> {
        let instrument = snapshot.lookup(id)?;
        let record = self.get(id)?;

        if record.status != PriceStatus::Fresh {
            return Ok(true);
        }

        if record.inputs.len() != instrument.inputs.len() {
            return Ok(true);
        }
        for (consumed, declared) in record.inputs.iter().zip(&instrument.inputs) {
            if consumed.instrument_id != *declared
                || consumed.version != self.current_version(declared)
            {
                return Ok(true);
            }
        }

        if let Some(seen) = record.observation_version {
            if self.observations.version(id) != Some(seen) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Drop the record of an instrument.
    pub fn remove(&self, id: &InstrumentId) -> Option<Arc<PriceRecord>> {
        self.records.remove(id).map(|(_, r)| r)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Point-in-time copy of every record, sorted by instrument.
    pub fn records(&self) -> Vec<Arc<PriceRecord>> {
        let mut records: Vec<_> = self.records.iter().map(|r| Arc::clone(r.value())).collect();
        records.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        records
    }

    /// Raw market observations.
    pub fn observations(&self) -> &ObservationStore {
        &self.observations
    }
}

//! Instrument registry with copy-on-write snapshots.
//!
//! The registry holds the static instrument definitions and the dependency
//! edges they induce. Writers are serialized and build a complete new
//! [`RegistrySnapshot`] before swapping it in; readers clone the current
//! `Arc` and keep an immutable view for as long as they need it (one
//! scheduling cycle). A failed write leaves the published snapshot untouched.
//!
//! Edges run from dependency to dependent, so outgoing neighbours of a node
//! are the instruments that must be revalued when it changes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use strata_traits::ids::InstrumentId;
use strata_traits::instrument::Instrument;

use crate::error::RegistryError;

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Immutable, versioned view of the registry.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    /// Bumped on every successful write.
    version: u64,

    /// Registered definitions.
    instruments: HashMap<InstrumentId, Arc<Instrument>>,

    /// Dependency edges (dependency -> dependent). Nodes also exist for
    /// referenced-but-unregistered inputs.
    graph: StableDiGraph<InstrumentId, ()>,

    /// Mapping from instrument ID to graph index.
    indices: HashMap<InstrumentId, NodeIndex>,
}

impl RegistrySnapshot {
    /// Registry version this snapshot was taken at.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of registered instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Returns true if no instruments are registered.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true if the instrument is registered.
    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.instruments.contains_key(id)
    }

    /// Registered definition, if any.
    pub fn get(&self, id: &InstrumentId) -> Option<&Arc<Instrument>> {
        self.instruments.get(id)
    }

    /// Registered definition or `NotFound`.
    pub fn lookup(&self, id: &InstrumentId) -> Result<Arc<Instrument>, RegistryError> {
        self.instruments
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Registered instrument IDs, sorted.
    pub fn ids(&self) -> Vec<InstrumentId> {
        let mut ids: Vec<_> = self.instruments.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Instruments that consume `id` directly, sorted.
    pub fn dependents(&self, id: &InstrumentId) -> Vec<InstrumentId> {
        self.neighbours(id, Direction::Outgoing)
    }

    /// Distinct inputs of `id`, sorted. Includes unregistered inputs.
    pub fn dependencies(&self, id: &InstrumentId) -> Vec<InstrumentId> {
        self.neighbours(id, Direction::Incoming)
    }

    fn neighbours(&self, id: &InstrumentId, direction: Direction) -> Vec<InstrumentId> {
        let Some(idx) = self.indices.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<InstrumentId> = self
            .graph
            .neighbors_directed(*idx, direction)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn node(&mut self, id: &InstrumentId) -> NodeIndex {
        if let Some(idx) = self.indices.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.indices.insert(id.clone(), idx);
        idx
    }

    /// Drop a node that is neither registered nor referenced.
    fn prune(&mut self, id: &InstrumentId) {
        if self.instruments.contains_key(id) {
            return;
        }
        if let Some(idx) = self.indices.get(id).copied() {
            let referenced = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .next()
                .is_some();
            if !referenced {
                self.graph.remove_node(idx);
                self.indices.remove(id);
            }
        }
    }

    /// Insert or replace one definition. Mutates `self` even on error;
    /// callers work on a private copy.
    fn insert(&mut self, instrument: Instrument) -> Result<(), RegistryError> {
        if let Some(existing) = self.instruments.get(&instrument.id) {
            if existing.kind != instrument.kind {
                return Err(RegistryError::DuplicateInstrument {
                    id: instrument.id.clone(),
                    existing: existing.kind.clone(),
                    requested: instrument.kind.clone(),
                });
            }
        }

        let idx = self.node(&instrument.id);

        // Replacing a definition drops its previous input edges.
        let stale_edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.id())
            .collect();
        let previous_inputs: Vec<InstrumentId> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        for edge in stale_edges {
            self.graph.remove_edge(edge);
        }

        for dependency in &instrument.inputs {
            if *dependency == instrument.id {
                return Err(RegistryError::CycleDetected {
                    instrument: instrument.id.clone(),
                    dependency: dependency.clone(),
                });
            }
            let dep_idx = self.node(dependency);
            // A path instrument ~> dependency plus the new edge would close a loop.
            if has_path_connecting(&self.graph, idx, dep_idx, None) {
                return Err(RegistryError::CycleDetected {
                    instrument: instrument.id.clone(),
                    dependency: dependency.clone(),
                });
            }
            self.graph.update_edge(dep_idx, idx, ());
        }

        let id = instrument.id.clone();
        self.instruments.insert(id, Arc::new(instrument));

        for input in previous_inputs {
            self.prune(&input);
        }
        Ok(())
    }

    fn remove(&mut self, id: &InstrumentId) -> Result<Arc<Instrument>, RegistryError> {
        if !self.instruments.contains_key(id) {
            return Err(RegistryError::NotFound(id.clone()));
        }
        let dependents = self.dependents(id);
        if !dependents.is_empty() {
            return Err(RegistryError::InUse {
                id: id.clone(),
                dependents,
            });
        }

        let inputs = self.dependencies(id);
        let removed = self
            .instruments
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        if let Some(idx) = self.indices.remove(id) {
            self.graph.remove_node(idx);
        }
        for input in inputs {
            self.prune(&input);
        }
        Ok(removed)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Instrument registry. Reads never block on writes.
#[derive(Default)]
pub struct Registry {
    /// Currently published snapshot.
    current: RwLock<Arc<RegistrySnapshot>>,

    /// Serializes writers.
    writer: Mutex<()>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.current.read().clone()
    }

    /// Register or replace one instrument. Returns the new registry version.
    pub fn register(&self, instrument: Instrument) -> Result<u64, RegistryError> {
        self.register_all(std::iter::once(instrument))
    }

    /// Register a batch of instruments atomically: either all definitions
    /// are committed in one new snapshot or none are.
    pub fn register_all<I>(&self, instruments: I) -> Result<u64, RegistryError>
    where
        I: IntoIterator<Item = Instrument>,
    {
        self.write(|next| {
            for instrument in instruments {
                let id = instrument.id.clone();
                next.insert(instrument)?;
                tracing::debug!(instrument = %id, "Instrument staged");
            }
            Ok(())
        })
    }

    /// Remove an instrument that nothing depends on.
    pub fn deregister(&self, id: &InstrumentId) -> Result<Arc<Instrument>, RegistryError> {
        let mut removed = None;
        self.write(|next| {
            removed = Some(next.remove(id)?);
            Ok(())
        })?;
        removed.ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Registered definition or `NotFound`.
    pub fn lookup(&self, id: &InstrumentId) -> Result<Arc<Instrument>, RegistryError> {
        self.snapshot().lookup(id)
    }

    /// Direct dependents of `id` in the current snapshot.
    pub fn dependents(&self, id: &InstrumentId) -> Vec<InstrumentId> {
        self.snapshot().dependents(id)
    }

    /// Direct dependencies of `id` in the current snapshot.
    pub fn dependencies(&self, id: &InstrumentId) -> Vec<InstrumentId> {
        self.snapshot().dependencies(id)
    }

    fn write<F>(&self, apply: F) -> Result<u64, RegistryError>
    where
        F: FnOnce(&mut RegistrySnapshot) -> Result<(), RegistryError>,
    {
        let _guard = self.writer.lock();
        let mut next = (*self.snapshot()).clone();

        if let Err(e) = apply(&mut next) {
            tracing::warn!(error = %e, "Registry update rejected");
            return Err(e);
        }

        next.version += 1;
        let version = next.version;
        *self.current.write() = Arc::new(next);

        tracing::info!(
            registry_version = version,
            "Registry snapshot published"
        );
        Ok(version)
    }
}

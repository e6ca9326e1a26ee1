//! Dependency graph operations and dirty-mark tracking.
//!
//! The persistent edge set lives in the registry snapshot. This module works
//! on top of it:
//!
//! - [`DirtySet`]: pending marks shared between producers and the scheduler
//! - [`expand`]: transitive closure of a dirty set following dependents
//! - [`topological_batches`]: Kahn layering of an expansion into batches
//!   that are safe to recompute in parallel
//!
//! Batches are built over a per-cycle arena (`Vec` of ids plus index maps),
//! not over the registry graph, so a cycle never holds on to a registry
//! lock.

use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use strata_traits::ids::{InstrumentId, Version};

use crate::error::{EngineError, EngineResult};
use crate::registry::RegistrySnapshot;

// =============================================================================
// DIRTY MARKS
// =============================================================================

/// An instrument known to need revaluation, and the input version that
/// triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirtyMark {
    /// Instrument to revalue
    pub instrument_id: InstrumentId,
    /// Highest triggering version seen
    pub version: Version,
}

/// Pending dirty marks. Repeated marks collapse to the highest version.
///
/// Any thread may mark; only the scheduler drains.
#[derive(Debug, Default)]
pub struct DirtySet {
    pending: Mutex<HashMap<InstrumentId, Version>>,
}

impl DirtySet {
    /// Creates an empty dirty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mark. Returns true if the instrument was not pending or
    /// the version is higher than the one pending.
    pub fn mark_dirty(&self, instrument_id: InstrumentId, version: Version) -> bool {
        let mut pending = self.pending.lock();
        match pending.get_mut(&instrument_id) {
            Some(existing) if *existing >= version => false,
            Some(existing) => {
                *existing = version;
                true
            }
            None => {
                pending.insert(instrument_id, version);
                true
            }
        }
    }

    /// Take every pending mark, sorted by instrument.
    pub fn drain(&self) -> Vec<DirtyMark> {
        let taken = std::mem::take(&mut *self.pending.lock());
        let mut marks: Vec<DirtyMark> = taken
            .into_iter()
            .map(|(instrument_id, version)| DirtyMark {
                instrument_id,
                version,
            })
            .collect();
        marks.sort_by(|a, b| a.instrument_id.cmp(&b.instrument_id));
        marks
    }

    /// Number of pending marks.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if the instrument has a pending mark.
    pub fn is_pending(&self, instrument_id: &InstrumentId) -> bool {
        self.pending.lock().contains_key(instrument_id)
    }
}

// =============================================================================
// EXPANSION
// =============================================================================

/// Transitive closure of `roots` under "has a dependent".
///
/// The result contains every root plus every instrument that depends on a
/// root, directly or indirectly.
pub fn expand<'a, I>(snapshot: &RegistrySnapshot, roots: I) -> BTreeSet<InstrumentId>
where
    I: IntoIterator<Item = &'a InstrumentId>,
{
    let mut closure = BTreeSet::new();
    let mut queue = VecDeque::new();

    for root in roots {
        if closure.insert(root.clone()) {
            queue.push_back(root.clone());
        }
    }

    while let Some(id) = queue.pop_front() {
        for dependent in snapshot.dependents(&id) {
            if closure.insert(dependent.clone()) {
                queue.push_back(dependent);
            }
        }
    }

    closure
}

// =============================================================================
// BATCHING
// =============================================================================

/// Split `nodes` into ordered batches.
///
/// Every instrument in batch `i` depends only on instruments in batches
/// `< i` or on instruments outside `nodes`. Each batch is sorted by id.
pub fn topological_batches(
    snapshot: &RegistrySnapshot,
    nodes: &BTreeSet<InstrumentId>,
) -> EngineResult<Vec<Vec<InstrumentId>>> {
    let arena: Vec<&InstrumentId> = nodes.iter().collect();
    let index: HashMap<&InstrumentId, usize> =
        arena.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut in_degree = vec![0usize; arena.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); arena.len()];

    for (i, id) in arena.iter().enumerate() {
        for dependency in snapshot.dependencies(id) {
            if let Some(&j) = index.get(&dependency) {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    let mut batches = Vec::new();
    let mut ready: Vec<usize> = (0..arena.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut placed = 0;

    while !ready.is_empty() {
        let mut next = Vec::new();
        for &i in &ready {
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    next.push(d);
                }
            }
        }
        next.sort_unstable();
        placed += ready.len();
        batches.push(ready.iter().map(|&i| arena[i].clone()).collect());
        ready = next;
    }

    if placed != arena.len() {
        return Err(EngineError::Internal(format!(
            "dependency cycle among {} dirty instruments",
            arena.len() - placed
        )));
    }

    Ok(batches)
}

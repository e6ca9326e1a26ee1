//! Property-based tests for registry and dependency graph invariants.
//!
//! - Acyclic definitions always register
//! - A definition closing a loop is rejected and changes nothing
//! - Expansion is closed under "has a dependent"
//! - Batches respect dependency order and partition the expansion

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use strata_engine::graph::{expand, topological_batches};
use strata_engine::{Registry, RegistryError};
use strata_traits::ids::InstrumentId;
use strata_traits::instrument::{Instrument, InstrumentKind};

// =============================================================================
// GENERATORS
// =============================================================================

fn name(i: usize) -> String {
    format!("N{:03}", i)
}

/// Instruments `N000..N{n}` where each node only consumes lower-numbered
/// nodes, so the graph is acyclic by construction. Node `i > 0` always
/// consumes `i - 1`, which makes the whole set one connected chain.
fn dag() -> impl Strategy<Value = Vec<Instrument>> {
    (2usize..24)
        .prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(any::<prop::sample::Index>(), 0..3), n)
        })
        .prop_map(|extra| {
            extra
                .iter()
                .enumerate()
                .map(|(i, picks)| {
                    if i == 0 {
                        return Instrument::new(name(0), InstrumentKind::Equity);
                    }
                    let mut inputs: Vec<String> = vec![name(i - 1)];
                    for pick in picks {
                        let dependency = name(pick.index(i));
                        if !inputs.contains(&dependency) {
                            inputs.push(dependency);
                        }
                    }
                    Instrument::new(name(i), InstrumentKind::Index).with_inputs(inputs)
                })
                .collect()
        })
}

fn registry_of(instruments: &[Instrument]) -> Registry {
    let registry = Registry::new();
    registry.register_all(instruments.to_vec()).unwrap();
    registry
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_acyclic_definitions_register(instruments in dag()) {
        let registry = Registry::new();
        let n = instruments.len();
        prop_assert!(registry.register_all(instruments).is_ok());
        prop_assert_eq!(registry.snapshot().len(), n);
    }

    #[test]
    fn prop_cycle_rejected_without_change(instruments in dag()) {
        let registry = registry_of(&instruments);
        let before = registry.snapshot();
        let last = name(instruments.len() - 1);

        let closing = Instrument::new(name(0), InstrumentKind::Equity).with_inputs([last]);
        let result = registry.register(closing);
        let is_cycle = matches!(result, Err(RegistryError::CycleDetected { .. }));
        prop_assert!(is_cycle);

        let after = registry.snapshot();
        prop_assert_eq!(after.version(), before.version());
        prop_assert_eq!(after.edge_count(), before.edge_count());
        prop_assert!(after.lookup(&InstrumentId::new(name(0))).unwrap().is_leaf());
    }

    #[test]
    fn prop_expansion_closed_under_dependents(
        instruments in dag(),
        root in any::<prop::sample::Index>(),
    ) {
        let registry = registry_of(&instruments);
        let snapshot = registry.snapshot();
        let root = InstrumentId::new(name(root.index(instruments.len())));

        let closure = expand(&snapshot, [&root]);
        prop_assert!(closure.contains(&root));
        for id in &closure {
            for dependent in snapshot.dependents(id) {
                prop_assert!(closure.contains(&dependent));
            }
        }
    }

    #[test]
    fn prop_batches_respect_dependencies(
        instruments in dag(),
        roots in proptest::collection::vec(any::<prop::sample::Index>(), 1..4),
    ) {
        let registry = registry_of(&instruments);
        let snapshot = registry.snapshot();
        let roots: Vec<InstrumentId> = roots
            .iter()
            .map(|r| InstrumentId::new(name(r.index(instruments.len()))))
            .collect();

        let closure = expand(&snapshot, &roots);
        let batches = topological_batches(&snapshot, &closure).unwrap();

        let mut position: HashMap<&InstrumentId, usize> = HashMap::new();
        for (i, batch) in batches.iter().enumerate() {
            let mut sorted = batch.clone();
            sorted.sort();
            prop_assert_eq!(&sorted, batch);
            for id in batch {
                prop_assert!(position.insert(id, i).is_none());
            }
        }

        let placed: BTreeSet<InstrumentId> = position.keys().map(|id| (*id).clone()).collect();
        prop_assert_eq!(placed, closure.clone());

        for (id, &batch) in &position {
            for dependency in snapshot.dependencies(id) {
                if let Some(&dep_batch) = position.get(&dependency) {
                    prop_assert!(dep_batch < batch);
                }
            }
        }
    }
}

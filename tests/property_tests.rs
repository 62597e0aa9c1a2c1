//! Property-based checks of convergence, idempotence and batch bounds over
//! generated catalogs.

use std::sync::Arc;

use proptest::collection::vec;
use proptest::prelude::*;

use distributor::reconcile::{Phase, Reconciler};
use distributor::store::{BatchSize, CatalogGraph, MemoryStore};

const GROUPS: usize = 6;

/// A generated catalog. Indices are reduced modulo the collection sizes.
#[derive(Debug, Clone)]
struct Catalog {
    /// `parents[i] < i` makes group `i` a child of that group.
    parents: Vec<usize>,
    /// Disallowed groups per business; empty means unconstrained.
    rules: Vec<Vec<usize>>,
    /// Product group per offering; `None` for an offering with no product.
    offerings: Vec<Option<usize>>,
    links: Vec<(usize, usize)>,
}

impl Catalog {
    fn build(&self) -> CatalogGraph {
        let mut graph = CatalogGraph::new();
        for (group, &parent) in self.parents.iter().enumerate() {
            if parent < group {
                graph.set_broader(&format!("g{group}"), &format!("g{parent}"));
            }
        }
        for (business, rules) in self.rules.iter().enumerate() {
            let name = format!("b{business}");
            graph.add_business(&name);
            for group in rules {
                graph.disallow(&name, &format!("g{}", group % GROUPS));
            }
        }
        for (offering, group) in self.offerings.iter().enumerate() {
            let name = format!("o{offering}");
            match group {
                Some(group) => {
                    let product = format!("p{offering}");
                    graph
                        .offer_product(&name, &product)
                        .classify(&product, &format!("g{}", group % GROUPS));
                }
                None => {
                    graph.add_offering(&name);
                }
            }
        }
        if !self.offerings.is_empty() {
            for (offering, business) in &self.links {
                graph.link(
                    &format!("o{}", offering % self.offerings.len()),
                    &format!("b{}", business % self.rules.len()),
                );
            }
        }
        graph
    }
}

fn catalog() -> impl Strategy<Value = Catalog> {
    (
        vec(0usize..GROUPS, GROUPS),
        vec(vec(0usize..GROUPS, 0..3), 1..5),
        vec(proptest::option::of(0usize..GROUPS), 0..15),
        vec((0usize..15, 0usize..5), 0..40),
    )
        .prop_map(|(parents, rules, offerings, links)| Catalog {
            parents,
            rules,
            offerings,
            links,
        })
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

fn is_consistent(graph: &CatalogGraph) -> bool {
    graph.businesses().all(|business| {
        if graph.is_constrained(business) {
            graph
                .offerings()
                .all(|o| graph.has_link(o, business) != graph.is_excluded(o, business))
        } else {
            graph.links().all(|(_, b)| b != business)
        }
    })
}

proptest! {
    /// A full run leaves every link agreeing with the exclusion rules.
    #[test]
    fn full_run_restores_invariant(catalog in catalog(), batch in 1usize..8) {
        let store = Arc::new(MemoryStore::new(catalog.build()));
        let reconciler = Reconciler::new(store.clone(), BatchSize::new(batch).unwrap());

        block_on(reconciler.run_full()).unwrap();

        prop_assert!(is_consistent(&block_on(store.snapshot())));
        prop_assert!(block_on(reconciler.pending()).unwrap().is_converged());
    }

    /// Running again without outside changes changes nothing.
    #[test]
    fn second_run_changes_nothing(catalog in catalog(), batch in 1usize..8) {
        let store = Arc::new(MemoryStore::new(catalog.build()));
        let reconciler = Reconciler::new(store.clone(), BatchSize::new(batch).unwrap());

        block_on(reconciler.run_full()).unwrap();
        let converged = block_on(store.snapshot());
        let report = block_on(reconciler.run_full()).unwrap();

        prop_assert_eq!(report.pairs_changed(), 0);
        prop_assert_eq!(block_on(store.snapshot()), converged);
    }

    /// Each phase needs exactly ceil(violations / batch) rounds and no
    /// mutation exceeds the batch.
    #[test]
    fn rounds_match_batch_arithmetic(catalog in catalog(), batch in 1usize..8) {
        let store = Arc::new(MemoryStore::new(catalog.build()));
        let size = BatchSize::new(batch).unwrap();
        let reconciler = Reconciler::new(store.clone(), size);

        for phase in Phase::ALL {
            let violations = block_on(store.snapshot())
                .select(&phase.violation().pattern())
                .len();
            let report = block_on(reconciler.run_phase(phase)).unwrap();

            prop_assert_eq!(report.pairs_changed, violations);
            prop_assert_eq!(report.rounds as usize, violations.div_ceil(batch));
        }

        let mutations = block_on(store.mutations());
        prop_assert!(mutations.iter().all(|m| m.affected <= batch));
    }
}

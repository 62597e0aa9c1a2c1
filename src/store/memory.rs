//! In-memory [`LinkStore`] with the same selection semantics as the Cypher
//! adapter.
//!
//! Besides holding a [`CatalogGraph`], the store records every mutation it
//! applies, can fail a chosen call with a store error and can run a hook
//! before each mutation to play the part of a concurrent writer.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::store::pattern::{BusinessScope, Edit, Exclusion, LinkPattern, LinkState, Mutation};
use crate::store::LinkStore;

/// The slice of the catalog graph the reconciler reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogGraph {
    businesses: BTreeSet<String>,
    disallowed: BTreeMap<String, BTreeSet<String>>,
    broader: BTreeMap<String, String>,
    offerings: BTreeSet<String>,
    offering_products: BTreeMap<String, BTreeSet<String>>,
    product_groups: BTreeMap<String, BTreeSet<String>>,
    links: BTreeSet<(String, String)>,
}

impl CatalogGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_business(&mut self, business: &str) -> &mut Self {
        self.businesses.insert(business.to_string());
        self
    }

    /// Adds an exclusion rule, creating the business if needed.
    pub fn disallow(&mut self, business: &str, group: &str) -> &mut Self {
        self.add_business(business);
        self.disallowed
            .entry(business.to_string())
            .or_default()
            .insert(group.to_string());
        self
    }

    pub fn allow(&mut self, business: &str, group: &str) -> &mut Self {
        if let Some(rules) = self.disallowed.get_mut(business) {
            rules.remove(group);
            if rules.is_empty() {
                self.disallowed.remove(business);
            }
        }
        self
    }

    /// Sets the single direct parent of `group`.
    pub fn set_broader(&mut self, group: &str, parent: &str) -> &mut Self {
        self.broader.insert(group.to_string(), parent.to_string());
        self
    }

    pub fn add_offering(&mut self, offering: &str) -> &mut Self {
        self.offerings.insert(offering.to_string());
        self
    }

    /// Records the offering -> item -> product chain, creating the offering.
    pub fn offer_product(&mut self, offering: &str, product: &str) -> &mut Self {
        self.add_offering(offering);
        self.offering_products
            .entry(offering.to_string())
            .or_default()
            .insert(product.to_string());
        self
    }

    /// Places `product` in `group` (`group HAS_PRODUCT product`).
    pub fn classify(&mut self, product: &str, group: &str) -> &mut Self {
        self.product_groups
            .entry(product.to_string())
            .or_default()
            .insert(group.to_string());
        self
    }

    /// Stores an `AVAILABLE_AT_OR_FROM` edge. Endpoints are not created.
    pub fn link(&mut self, offering: &str, business: &str) -> &mut Self {
        self.links
            .insert((offering.to_string(), business.to_string()));
        self
    }

    pub fn unlink(&mut self, offering: &str, business: &str) -> &mut Self {
        self.links
            .remove(&(offering.to_string(), business.to_string()));
        self
    }

    pub fn has_link(&self, offering: &str, business: &str) -> bool {
        self.links
            .contains(&(offering.to_string(), business.to_string()))
    }

    /// All stored `(offering, business)` links in order.
    pub fn links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links.iter().map(|(o, b)| (o.as_str(), b.as_str()))
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn businesses(&self) -> impl Iterator<Item = &str> {
        self.businesses.iter().map(String::as_str)
    }

    pub fn offerings(&self) -> impl Iterator<Item = &str> {
        self.offerings.iter().map(String::as_str)
    }

    pub fn is_constrained(&self, business: &str) -> bool {
        self.disallowed
            .get(business)
            .is_some_and(|rules| !rules.is_empty())
    }

    /// True when a group of one of the offering's products, or that group's
    /// direct parent, is disallowed by the business.
    pub fn is_excluded(&self, offering: &str, business: &str) -> bool {
        let Some(rules) = self.disallowed.get(business) else {
            return false;
        };
        self.groups_of(offering).any(|group| {
            rules.contains(group)
                || self
                    .broader
                    .get(group)
                    .is_some_and(|parent| rules.contains(parent))
        })
    }

    fn groups_of<'a>(&'a self, offering: &str) -> impl Iterator<Item = &'a String> + 'a {
        self.offering_products
            .get(offering)
            .into_iter()
            .flatten()
            .filter_map(|product| self.product_groups.get(product))
            .flatten()
    }

    /// Every pair matching the pattern, ordered by business then offering.
    pub fn select(&self, pattern: &LinkPattern) -> Vec<(String, String)> {
        let want_constrained = pattern.business == BusinessScope::Constrained;
        let mut pairs = Vec::new();

        for business in &self.businesses {
            if self.is_constrained(business) != want_constrained {
                continue;
            }

            let candidates: Vec<&String> = match pattern.link {
                LinkState::Present => self
                    .links
                    .iter()
                    .filter(|(_, b)| b == business)
                    .map(|(o, _)| o)
                    // Unconstrained cleanup accepts links from any node
                    .filter(|o| !want_constrained || self.offerings.contains(*o))
                    .collect(),
                LinkState::Absent => self
                    .offerings
                    .iter()
                    .filter(|o| !self.links.contains(&((*o).clone(), business.clone())))
                    .collect(),
            };

            for offering in candidates {
                let keep = match pattern.exclusion {
                    Exclusion::Any => true,
                    Exclusion::Excluded => self.is_excluded(offering, business),
                    Exclusion::Allowed => !self.is_excluded(offering, business),
                };
                if keep {
                    pairs.push((offering.clone(), business.clone()));
                }
            }
        }

        pairs
    }

    /// Applies a mutation, returning the number of pairs changed.
    pub fn apply(&mut self, mutation: &Mutation) -> usize {
        let pairs = self.select(&mutation.selection);
        let mut affected = 0;
        for pair in pairs.into_iter().take(mutation.limit.get()) {
            let changed = match mutation.edit {
                Edit::Insert => self.links.insert(pair),
                Edit::Delete => self.links.remove(&pair),
            };
            if changed {
                affected += 1;
            }
        }
        affected
    }
}

/// Store operation targeted by an injected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Ask,
    Mutate,
}

/// Kind of store error to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    QueryFailed,
    Timeout,
}

impl FailureKind {
    fn to_error(self) -> AppError {
        match self {
            FailureKind::Unavailable => AppError::StoreUnavailable("injected".to_string()),
            FailureKind::QueryFailed => AppError::StoreQueryFailed {
                message: "injected".to_string(),
                query: String::new(),
            },
            FailureKind::Timeout => AppError::StoreTimeout("injected".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InjectedFailure {
    operation: Operation,
    remaining: usize,
    kind: FailureKind,
}

/// A mutation as applied by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub mutation: Mutation,
    pub affected: usize,
}

type Hook = Box<dyn FnMut(&mut CatalogGraph) + Send>;

#[derive(Default)]
struct State {
    graph: CatalogGraph,
    asks: usize,
    mutations: Vec<MutationRecord>,
    failure: Option<InjectedFailure>,
    before_mutate: Option<Hook>,
}

impl State {
    /// Consumes the injected failure when it is due for `operation`.
    fn take_failure(&mut self, operation: Operation) -> Option<AppError> {
        let failure = self.failure.as_mut()?;
        if failure.operation != operation {
            return None;
        }
        if failure.remaining > 0 {
            failure.remaining -= 1;
            return None;
        }
        let kind = failure.kind;
        self.failure = None;
        Some(kind.to_error())
    }
}

/// In-memory link store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(graph: CatalogGraph) -> Self {
        Self {
            state: Mutex::new(State {
                graph,
                ..State::default()
            }),
        }
    }

    /// Copy of the current graph.
    pub async fn snapshot(&self) -> CatalogGraph {
        self.state.lock().await.graph.clone()
    }

    /// Changes the graph the way an external writer would.
    pub async fn update(&self, f: impl FnOnce(&mut CatalogGraph)) {
        f(&mut self.state.lock().await.graph);
    }

    /// Fails the `operation` call after `successes` more successful calls.
    /// The failure fires once.
    pub async fn fail_after(&self, operation: Operation, successes: usize, kind: FailureKind) {
        self.state.lock().await.failure = Some(InjectedFailure {
            operation,
            remaining: successes,
            kind,
        });
    }

    /// Runs `hook` against the graph right before each mutation selects its pairs.
    pub async fn before_mutate(&self, hook: impl FnMut(&mut CatalogGraph) + Send + 'static) {
        self.state.lock().await.before_mutate = Some(Box::new(hook));
    }

    pub async fn mutations(&self) -> Vec<MutationRecord> {
        self.state.lock().await.mutations.clone()
    }

    pub async fn ask_count(&self) -> usize {
        self.state.lock().await.asks
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn ask(&self, pattern: &LinkPattern) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.take_failure(Operation::Ask) {
            return Err(err);
        }
        state.asks += 1;
        Ok(!state.graph.select(pattern).is_empty())
    }

    async fn mutate(&self, mutation: &Mutation) -> Result<usize, AppError> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.take_failure(Operation::Mutate) {
            return Err(err);
        }

        let State {
            graph,
            before_mutate,
            ..
        } = &mut *state;
        if let Some(hook) = before_mutate.as_mut() {
            hook(graph);
        }

        let affected = state.graph.apply(mutation);
        state.mutations.push(MutationRecord {
            mutation: *mutation,
            affected,
        });
        Ok(affected)
    }
}

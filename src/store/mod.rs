//! Graph store adapter contract.
//!
//! The reconciler only ever talks to the store through [`LinkStore`]: a
//! side-effect free existence check and a bounded edge rewrite, both
//! expressed as typed [`LinkPattern`]s.
//!
//! - [`CypherLinkStore`] renders patterns to Cypher for any
//!   [`GraphClient`](crate::graph::GraphClient)
//! - [`MemoryStore`] evaluates them over an in-memory [`CatalogGraph`]

mod cypher;
mod memory;
mod pattern;

pub mod vocab;

pub use cypher::{render_ask, render_mutation, render_selection, CypherLinkStore};
pub use memory::{CatalogGraph, FailureKind, MemoryStore, MutationRecord, Operation};
pub use pattern::{BatchSize, BusinessScope, Edit, Exclusion, LinkPattern, LinkState, Mutation};

use async_trait::async_trait;

use crate::error::AppError;

/// Query/update capability over the shared catalog graph.
///
/// Implementations must treat each call independently: there is no
/// isolation between an `ask` and a following `mutate`.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// True iff at least one pair matches `pattern`. No side effects.
    async fn ask(&self, pattern: &LinkPattern) -> Result<bool, AppError>;

    /// Applies `mutation.edit` to at most `mutation.limit` pairs selected
    /// at call time. Applies completely or not at all; returns the number
    /// of pairs changed.
    async fn mutate(&self, mutation: &Mutation) -> Result<usize, AppError>;
}

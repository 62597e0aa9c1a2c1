//! Bounded repairs, one per [`Violation`].
//!
//! Pairs are selected by the store when the mutation runs, never taken from
//! an earlier check.

use crate::error::AppError;
use crate::reconcile::Violation;
use crate::store::{BatchSize, LinkStore};

/// Resolves up to `batch` pairs of `violation`. Returns the pairs changed.
pub async fn repair_batch(
    store: &dyn LinkStore,
    violation: Violation,
    batch: BatchSize,
) -> Result<usize, AppError> {
    let mutation = violation.repair(batch);
    let affected = store.mutate(&mutation).await?;
    tracing::debug!(?violation, edit = ?mutation.edit, affected, limit = batch.get(), "Applied batch");
    Ok(affected)
}

/// Deletes links into businesses without exclusion rules.
pub async fn remove_stale_links(store: &dyn LinkStore, batch: BatchSize) -> Result<usize, AppError> {
    repair_batch(store, Violation::StaleOnUnconstrained, batch).await
}

/// Inserts links from allowed offerings to constrained businesses.
pub async fn add_missing_links(store: &dyn LinkStore, batch: BatchSize) -> Result<usize, AppError> {
    repair_batch(store, Violation::MissingOnConstrained, batch).await
}

/// Deletes links from excluded offerings to constrained businesses.
pub async fn remove_extra_links(store: &dyn LinkStore, batch: BatchSize) -> Result<usize, AppError> {
    repair_batch(store, Violation::ExtraOnConstrained, batch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CatalogGraph, MemoryStore};

    #[tokio::test]
    async fn test_remove_stale_links_is_capped() {
        let mut graph = CatalogGraph::new();
        graph.add_business("b1");
        for i in 0..7 {
            graph.add_offering(&format!("o{i}")).link(&format!("o{i}"), "b1");
        }
        let store = MemoryStore::new(graph);
        let batch = BatchSize::new(5).unwrap();

        assert_eq!(remove_stale_links(&store, batch).await.unwrap(), 5);
        assert_eq!(remove_stale_links(&store, batch).await.unwrap(), 2);
        assert_eq!(remove_stale_links(&store, batch).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_missing_links_skips_excluded() {
        let mut graph = CatalogGraph::new();
        graph
            .disallow("b2", "g1")
            .offer_product("o-ok", "p-ok")
            .classify("p-ok", "g2")
            .offer_product("o-no", "p-no")
            .classify("p-no", "g1");
        let store = MemoryStore::new(graph);

        assert_eq!(add_missing_links(&store, BatchSize::DEFAULT).await.unwrap(), 1);

        let graph = store.snapshot().await;
        assert!(graph.has_link("o-ok", "b2"));
        assert!(!graph.has_link("o-no", "b2"));
    }

    #[tokio::test]
    async fn test_remove_extra_links_keeps_allowed() {
        let mut graph = CatalogGraph::new();
        graph
            .disallow("b3", "g1")
            .offer_product("o-ok", "p-ok")
            .classify("p-ok", "g2")
            .offer_product("o-no", "p-no")
            .classify("p-no", "g1")
            .link("o-ok", "b3")
            .link("o-no", "b3");
        let store = MemoryStore::new(graph);

        assert_eq!(remove_extra_links(&store, BatchSize::DEFAULT).await.unwrap(), 1);

        let graph = store.snapshot().await;
        assert!(graph.has_link("o-ok", "b3"));
        assert!(!graph.has_link("o-no", "b3"));
    }
}

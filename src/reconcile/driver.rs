//! Phase loops and the full reconciliation pipeline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::error::AppError;
use crate::reconcile::{mutator, predicates, Phase};
use crate::store::{BatchSize, LinkStore};

/// A failed reconciliation: the phase in progress and the store error that
/// aborted it.
#[derive(Debug, Error)]
#[error("phase {phase} failed: {source}")]
pub struct ReconcileError {
    pub phase: Phase,
    #[source]
    pub source: AppError,
}

/// Outcome of running one phase to convergence.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    /// Check/fix rounds that found the violation and applied a batch.
    pub rounds: u32,
    pub pairs_changed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of a full reconciliation, phases in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub phases: Vec<PhaseReport>,
}

impl ReconcileReport {
    pub fn pairs_changed(&self) -> usize {
        self.phases.iter().map(|p| p.pairs_changed).sum()
    }
}

/// Which phases currently have work to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingViolations {
    pub cleanup_unconstrained: bool,
    pub fill_constrained: bool,
    pub trim_constrained: bool,
}

impl PendingViolations {
    pub fn is_converged(&self) -> bool {
        !(self.cleanup_unconstrained || self.fill_constrained || self.trim_constrained)
    }
}

/// Drives the check/fix loops against an injected store.
///
/// Holds no state between calls; every decision is re-derived from the
/// store, so an interrupted run can simply be started again.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn LinkStore>,
    batch: BatchSize,
}

impl Reconciler {
    pub fn new(store: Arc<dyn LinkStore>, batch: BatchSize) -> Self {
        Self { store, batch }
    }

    pub fn batch(&self) -> BatchSize {
        self.batch
    }

    /// Runs every phase in [`Phase::ALL`] order, stopping at the first error.
    pub async fn run_full(&self) -> Result<ReconcileReport, ReconcileError> {
        tracing::info!("Starting distribution of offerings' locations");

        let mut phases = Vec::with_capacity(Phase::ALL.len());
        for phase in Phase::ALL {
            phases.push(self.run_phase(phase).await?);
        }

        let report = ReconcileReport { phases };
        tracing::info!(
            pairs_changed = report.pairs_changed(),
            "Location distribution complete"
        );
        Ok(report)
    }

    /// Runs one phase until its violation no longer exists.
    ///
    /// There is no round limit: every round that finds the violation
    /// resolves at least one pair unless another writer interferes.
    pub async fn run_phase(&self, phase: Phase) -> Result<PhaseReport, ReconcileError> {
        let violation = phase.violation();
        let started_at = Utc::now();
        let mut rounds: u32 = 0;
        let mut pairs_changed = 0;

        tracing::info!(%phase, batch = self.batch.get(), "Starting phase");

        let fail = move |source: AppError| {
            tracing::error!(%phase, error = %source, "Phase aborted");
            ReconcileError { phase, source }
        };

        while predicates::holds(self.store.as_ref(), violation)
            .await
            .map_err(fail)?
        {
            rounds += 1;
            let affected = mutator::repair_batch(self.store.as_ref(), violation, self.batch)
                .await
                .map_err(fail)?;
            pairs_changed += affected;

            if affected == 0 {
                tracing::warn!(%phase, round = rounds, "Round changed nothing; store changed underneath");
            } else {
                tracing::debug!(%phase, round = rounds, affected, "Round complete");
            }
        }

        let report = PhaseReport {
            phase,
            rounds,
            pairs_changed,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(%phase, rounds, pairs_changed, "Phase converged");
        Ok(report)
    }

    /// Evaluates every phase's predicate without changing anything.
    pub async fn pending(&self) -> Result<PendingViolations, ReconcileError> {
        let check = |phase: Phase| async move {
            predicates::holds(self.store.as_ref(), phase.violation())
                .await
                .map_err(|source| ReconcileError { phase, source })
        };

        Ok(PendingViolations {
            cleanup_unconstrained: check(Phase::CleanupUnconstrained).await?,
            fill_constrained: check(Phase::FillConstrained).await?,
            trim_constrained: check(Phase::TrimConstrained).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CatalogGraph, FailureKind, MemoryStore, Operation};

    fn reconciler(store: &Arc<MemoryStore>, batch: usize) -> Reconciler {
        Reconciler::new(store.clone(), BatchSize::new(batch).unwrap())
    }

    #[tokio::test]
    async fn test_phase_noop_when_converged() {
        let store = Arc::new(MemoryStore::default());
        let report = reconciler(&store, 100)
            .run_phase(Phase::FillConstrained)
            .await
            .unwrap();

        assert_eq!(report.rounds, 0);
        assert_eq!(report.pairs_changed, 0);
        assert!(store.mutations().await.is_empty());
        assert_eq!(store.ask_count().await, 1);
    }

    #[tokio::test]
    async fn test_rounds_follow_batch_size() {
        let mut graph = CatalogGraph::new();
        graph.add_business("b1");
        for i in 0..25 {
            let offering = format!("o{i:02}");
            graph.add_offering(&offering).link(&offering, "b1");
        }
        let store = Arc::new(MemoryStore::new(graph));

        let report = reconciler(&store, 10)
            .run_phase(Phase::CleanupUnconstrained)
            .await
            .unwrap();

        assert_eq!(report.rounds, 3);
        assert_eq!(report.pairs_changed, 25);
        let affected: Vec<usize> = store.mutations().await.iter().map(|m| m.affected).collect();
        assert_eq!(affected, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_error_carries_phase_and_stops_pipeline() {
        let mut graph = CatalogGraph::new();
        graph.disallow("b2", "g1").offer_product("o3", "p3").classify("p3", "g2");
        let store = Arc::new(MemoryStore::new(graph));
        store
            .fail_after(Operation::Mutate, 0, FailureKind::Unavailable)
            .await;

        let err = reconciler(&store, 100).run_full().await.unwrap_err();

        assert_eq!(err.phase, Phase::FillConstrained);
        assert!(matches!(err.source, AppError::StoreUnavailable(_)));
        // cleanup ask, fill ask; trim never ran
        assert_eq!(store.ask_count().await, 2);
        assert!(!store.snapshot().await.has_link("o3", "b2"));
    }

    #[tokio::test]
    async fn test_pending_reports_each_phase() {
        let mut graph = CatalogGraph::new();
        graph
            .add_business("b1")
            .add_offering("o1")
            .link("o1", "b1")
            .disallow("b3", "g1")
            .offer_product("o4", "p4")
            .classify("p4", "g1")
            .link("o4", "b3");
        let store = Arc::new(MemoryStore::new(graph));

        let pending = reconciler(&store, 100).pending().await.unwrap();

        assert_eq!(
            pending,
            PendingViolations {
                cleanup_unconstrained: true,
                // o1 has no product, so nothing excludes it from b3
                fill_constrained: true,
                trim_constrained: true,
            }
        );
        assert!(!pending.is_converged());
        assert!(store.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn test_pending_error_names_phase() {
        let store = Arc::new(MemoryStore::default());
        store.fail_after(Operation::Ask, 2, FailureKind::Timeout).await;

        let err = reconciler(&store, 100).pending().await.unwrap_err();
        assert_eq!(err.phase, Phase::TrimConstrained);
        assert!(err.to_string().starts_with("phase trim-constrained failed"));
    }
}

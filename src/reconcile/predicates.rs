//! Existence checks, one per [`Violation`].

use crate::error::AppError;
use crate::reconcile::Violation;
use crate::store::LinkStore;

/// True iff at least one pair exhibits `violation`.
pub async fn holds(store: &dyn LinkStore, violation: Violation) -> Result<bool, AppError> {
    let found = store.ask(&violation.pattern()).await?;
    tracing::debug!(?violation, found, "Evaluated predicate");
    Ok(found)
}

/// Some business without exclusion rules still has a link.
pub async fn has_stale_links_on_unconstrained(store: &dyn LinkStore) -> Result<bool, AppError> {
    holds(store, Violation::StaleOnUnconstrained).await
}

/// Some constrained business lacks a link to an offering it does not exclude.
pub async fn has_missing_links_on_constrained(store: &dyn LinkStore) -> Result<bool, AppError> {
    holds(store, Violation::MissingOnConstrained).await
}

/// Some constrained business has a link to an offering it excludes.
pub async fn has_extra_links_on_constrained(store: &dyn LinkStore) -> Result<bool, AppError> {
    holds(store, Violation::ExtraOnConstrained).await
}

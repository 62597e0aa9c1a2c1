//! Reconciliation of `AVAILABLE_AT_OR_FROM` links with exclusion rules.
//!
//! Each [`Phase`] targets one [`Violation`]: it checks whether the violation
//! exists anywhere in the store and, while it does, repairs one bounded batch
//! of it. Phases run in [`Phase::ALL`] order for a full reconciliation.
//!
//! ```ignore
//! let reconciler = Reconciler::new(store, BatchSize::DEFAULT);
//! let report = reconciler.run_full().await?;
//! tracing::info!(pairs_changed = report.pairs_changed(), "Distribution complete");
//! ```

mod driver;
pub mod mutator;
pub mod predicates;

pub use driver::{PendingViolations, PhaseReport, ReconcileError, ReconcileReport, Reconciler};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::{BatchSize, BusinessScope, Exclusion, LinkPattern, LinkState, Mutation};

/// One class of disagreement between exclusion rules and stored links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Violation {
    /// A business without rules still has links.
    StaleOnUnconstrained,
    /// A constrained business lacks a link to an offering it does not exclude.
    MissingOnConstrained,
    /// A constrained business has a link to an offering it excludes.
    ExtraOnConstrained,
}

impl Violation {
    pub const fn pattern(self) -> LinkPattern {
        match self {
            Violation::StaleOnUnconstrained => LinkPattern::new(
                BusinessScope::Unconstrained,
                LinkState::Present,
                Exclusion::Any,
            ),
            Violation::MissingOnConstrained => LinkPattern::new(
                BusinessScope::Constrained,
                LinkState::Absent,
                Exclusion::Allowed,
            ),
            Violation::ExtraOnConstrained => LinkPattern::new(
                BusinessScope::Constrained,
                LinkState::Present,
                Exclusion::Excluded,
            ),
        }
    }

    /// The bounded mutation resolving up to `batch` pairs of this violation.
    pub fn repair(self, batch: BatchSize) -> Mutation {
        Mutation::repair(self.pattern(), batch)
    }
}

/// A check-then-fix convergence loop over one violation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    CleanupUnconstrained,
    FillConstrained,
    TrimConstrained,
}

impl Phase {
    /// Pipeline order.
    pub const ALL: [Phase; 3] = [
        Phase::CleanupUnconstrained,
        Phase::FillConstrained,
        Phase::TrimConstrained,
    ];

    pub const fn violation(self) -> Violation {
        match self {
            Phase::CleanupUnconstrained => Violation::StaleOnUnconstrained,
            Phase::FillConstrained => Violation::MissingOnConstrained,
            Phase::TrimConstrained => Violation::ExtraOnConstrained,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Phase::CleanupUnconstrained => "cleanup-unconstrained",
            Phase::FillConstrained => "fill-constrained",
            Phase::TrimConstrained => "trim-constrained",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = AppError;

    /// Accepts `fill-constrained`, `fill_constrained` and `FillConstrained`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        Phase::ALL
            .into_iter()
            .find(|phase| phase.name().replace('-', "") == normalized)
            .ok_or_else(|| AppError::InvalidPhase(s.to_string()))
    }
}

//! Typed selections of `(offering, business)` pairs.
//!
//! A [`LinkPattern`] is the store-independent description of one class of
//! pairs; adapters turn it into Cypher or evaluate it in memory. Keeping the
//! predicate and its repair on the same pattern means a mutation always
//! re-selects exactly the pairs its check would have found.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Which businesses a pattern ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusinessScope {
    /// Businesses without any disallowed product group.
    Unconstrained,
    /// Businesses with at least one disallowed product group.
    Constrained,
}

/// Whether the `AVAILABLE_AT_OR_FROM` edge is currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkState {
    Present,
    Absent,
}

/// Filter on the exclusion rules of the business.
///
/// An offering is excluded by a business when the group of one of its
/// products, or that group's direct `BROADER` parent, is disallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Exclusion {
    Any,
    Excluded,
    Allowed,
}

/// A class of `(offering, business)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkPattern {
    pub business: BusinessScope,
    pub link: LinkState,
    pub exclusion: Exclusion,
}

impl LinkPattern {
    pub const fn new(business: BusinessScope, link: LinkState, exclusion: Exclusion) -> Self {
        Self {
            business,
            link,
            exclusion,
        }
    }
}

impl fmt::Display for LinkPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} business, link {:?}, exclusion {:?}",
            self.business, self.link, self.exclusion
        )
    }
}

/// Edge rewrite applied to each selected pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Edit {
    Insert,
    Delete,
}

/// Upper bound on pairs touched by one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchSize(usize);

impl BatchSize {
    pub const DEFAULT: BatchSize = BatchSize(100);

    /// Rejects zero, which would never make progress.
    pub fn new(size: usize) -> Result<Self, AppError> {
        if size == 0 {
            return Err(AppError::InvalidBatchSize(size));
        }
        Ok(Self(size))
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One bounded rewrite: apply `edit` to at most `limit` pairs of `selection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mutation {
    pub edit: Edit,
    pub selection: LinkPattern,
    pub limit: BatchSize,
}

impl Mutation {
    /// The mutation that flips the link state of the selected pairs:
    /// present links are deleted, absent ones inserted.
    pub fn repair(selection: LinkPattern, limit: BatchSize) -> Self {
        let edit = match selection.link {
            LinkState::Present => Edit::Delete,
            LinkState::Absent => Edit::Insert,
        };
        Self {
            edit,
            selection,
            limit,
        }
    }
}

//! Offering location distributor.
//!
//! Keeps `AVAILABLE_AT_OR_FROM` links between offerings and business
//! entities consistent with each business's disallowed product groups,
//! converging through bounded batches over a shared graph store.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod reconcile;
pub mod store;

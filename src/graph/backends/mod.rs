//! Backend implementations for different graph databases.
//!
//! Each backend implements [`CypherExecutor`](crate::graph::CypherExecutor),
//! [`Transaction`](crate::graph::Transaction) and
//! [`GraphClient`](crate::graph::GraphClient).
//!
//! | Backend | Module |
//! |---------|--------|
//! | PostgreSQL + Apache AGE | [`postgres`] |

pub mod postgres;

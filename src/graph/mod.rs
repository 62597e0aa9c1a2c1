//! Graph abstraction layer for backend-agnostic Cypher execution.
//!
//! - [`CypherExecutor`] - Execute Cypher statements (required for all backends)
//! - [`Transaction`] - Transaction lifecycle (commit/rollback)
//! - [`GraphClient`] - Connection management and transaction creation
//!
//! ```ignore
//! use distributor::graph::{GraphClient, QueryExt, Transaction};
//!
//! let txn = client.begin().await?;
//! let row = txn
//!     .query("MATCH (o:Offering)-[r:AVAILABLE_AT_OR_FROM]->(b) DELETE r RETURN count(*) AS affected")
//!     .fetch_one()
//!     .await?;
//! txn.commit().await?;
//! ```

mod cypher;
mod query;
mod row;
mod traits;

pub mod backends;

pub use cypher::{extract_return_columns, ParseError};
pub use query::{Query, QueryExt};
pub use row::{Params, Row, RowStream};
pub use traits::{CypherExecutor, GraphClient, Transaction};

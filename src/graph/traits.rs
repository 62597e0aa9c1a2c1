//! Core traits for graph database abstraction.
//!
//! - [`CypherExecutor`] - Required for all graph backends
//! - [`Transaction`] - Transaction lifecycle management
//! - [`GraphClient`] - Connection pool and transaction creation

use async_trait::async_trait;

use crate::error::AppError;
use crate::graph::row::{Params, RowStream};

/// Executes Cypher statements against a graph database.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    /// Executes a Cypher statement and returns a stream of result rows.
    async fn execute_cypher(&self, cypher: &str, params: Params)
        -> Result<RowStream<'_>, AppError>;

    /// Executes a Cypher statement, draining and discarding its rows.
    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        use futures::StreamExt;
        let mut stream = self.execute_cypher(cypher, params).await?;
        while let Some(result) = stream.next().await {
            result?;
        }
        Ok(())
    }
}

/// Transaction lifecycle management.
///
/// Consuming `commit`/`rollback` ensures a finished transaction cannot be
/// reused.
#[async_trait]
pub trait Transaction: Send + Sync {
    async fn commit(self) -> Result<(), AppError>;

    async fn rollback(self) -> Result<(), AppError>;
}

/// A graph database client that can begin transactions.
///
/// The executor methods on the client itself run in auto-commit mode;
/// [`begin`](GraphClient::begin) opens an explicit transaction for
/// statements that must apply atomically.
#[async_trait]
pub trait GraphClient: CypherExecutor {
    /// The transaction type returned by this client.
    type Tx<'a>: Transaction + CypherExecutor
    where
        Self: 'a;

    async fn begin(&self) -> Result<Self::Tx<'_>, AppError>;
}

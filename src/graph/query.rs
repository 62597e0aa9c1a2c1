//! Query builder for fluent Cypher statement construction.

use futures::StreamExt;
use serde::Serialize;

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::CypherExecutor;

/// A builder for binding parameters and executing one Cypher statement.
///
/// A parameter that fails to serialize is reported when the statement is
/// executed, so the builder chain itself never fails.
///
/// ```ignore
/// let row = client
///     .query("MATCH (b:BusinessEntity {id: $id}) RETURN b.id AS id")
///     .param("id", "shop-1")
///     .fetch_one()
///     .await?;
/// ```
pub struct Query<'a, E: CypherExecutor + ?Sized> {
    executor: &'a E,
    cypher: String,
    params: Result<Params, AppError>,
}

impl<'a, E: CypherExecutor + ?Sized> Query<'a, E> {
    pub fn new(executor: &'a E, cypher: &str) -> Self {
        Self {
            executor,
            cypher: cypher.to_string(),
            params: Ok(Params::new()),
        }
    }

    /// Binds `$name` to a serializable value.
    pub fn param<T: Serialize>(mut self, name: &str, value: T) -> Self {
        self.params = self.params.and_then(|mut params| {
            let value = serde_json::to_value(value).map_err(|e| {
                AppError::Internal(format!("failed to serialize parameter '{}': {}", name, e))
            })?;
            params.insert(name.to_string(), value);
            Ok(params)
        });
        self
    }

    /// Executes the statement and returns a stream of rows.
    pub async fn execute(self) -> Result<RowStream<'a>, AppError> {
        let params = self.params?;
        self.executor.execute_cypher(&self.cypher, params).await
    }

    /// Executes the statement and returns the first row, if any.
    pub async fn fetch_one(self) -> Result<Option<Row>, AppError> {
        let mut stream = self.execute().await?;
        stream.next().await.transpose()
    }

    /// Executes the statement without returning results.
    pub async fn run(self) -> Result<(), AppError> {
        let params = self.params?;
        self.executor.run_cypher(&self.cypher, params).await
    }
}

/// Extension trait providing `executor.query("...")`.
pub trait QueryExt: CypherExecutor {
    fn query(&self, cypher: &str) -> Query<'_, Self>
    where
        Self: Sized,
    {
        Query::new(self, cypher)
    }
}

impl<E: CypherExecutor> QueryExt for E {}

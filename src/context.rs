//! Application context: configuration, store client and reconciler.

use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::graph::backends::postgres::PostgresClient;
use crate::reconcile::Reconciler;
use crate::store::CypherLinkStore;

/// Shared dependencies for the CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    /// Pooled PostgreSQL + AGE client.
    pub client: PostgresClient,
    /// Reconciler over a Cypher store sharing `client`'s pool.
    pub reconciler: Reconciler,
}

impl Context {
    /// Builds the context. Connections are opened lazily by the pool.
    pub async fn connect(config: Config) -> Result<Self, AppError> {
        let batch = config.reconcile.batch()?;
        let client = PostgresClient::connect(&config.postgres).await?;
        tracing::info!(
            graph = client.graph_name(),
            batch = batch.get(),
            "Configured graph store"
        );

        let store = CypherLinkStore::new(client.clone());
        let reconciler = Reconciler::new(Arc::new(store), batch);

        Ok(Self {
            config: Arc::new(config),
            client,
            reconciler,
        })
    }
}

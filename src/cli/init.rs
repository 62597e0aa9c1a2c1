//! Init command handler.

use color_eyre::Result;

use crate::config::Config;
use crate::graph::backends::postgres::PostgresClient;

use super::App;

impl App {
    /// Create the AGE graph and every label the reconciler queries.
    pub async fn run_init(&self) -> Result<()> {
        let config = Config::load()?;

        tracing::info!(graph = %config.postgres.graph, "Connecting to PostgreSQL + AGE");
        let client = PostgresClient::connect(&config.postgres).await?;

        client.ensure_graph_exists().await?;

        let created = client.ensure_labels().await?;
        if created.is_empty() {
            tracing::info!("All labels already present");
        } else {
            tracing::info!(?created, "Created labels");
        }

        Ok(())
    }
}

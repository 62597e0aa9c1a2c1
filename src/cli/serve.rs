//! HTTP server command handler.

use std::net::SocketAddr;

use color_eyre::eyre::eyre;
use color_eyre::Result;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::context::Context;

use super::App;

impl App {
    /// Run the HTTP trigger server.
    pub async fn run_serve(&self, host: Option<&str>, port: Option<u16>) -> Result<()> {
        let config = Config::load()?;

        let host = host.unwrap_or(&config.server.host).to_string();
        let port = port.unwrap_or(config.server.port);
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| eyre!("Invalid address {host}:{port}: {e}"))?;

        let ctx = Context::connect(config).await?;
        let state = AppState::new(ctx.reconciler.clone());

        api::run_server(addr, state)
            .await
            .map_err(|e| eyre!("HTTP server error on {addr}: {e}"))
    }
}

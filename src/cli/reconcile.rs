//! Reconcile and status command handlers.

use color_eyre::Result;
use serde::Serialize;

use crate::config::Config;
use crate::context::Context;
use crate::reconcile::Phase;

use super::App;

impl App {
    /// Run one phase, or all of them, and print the JSON report.
    pub async fn run_reconcile(&self, phase: Option<Phase>) -> Result<()> {
        let ctx = Context::connect(Config::load()?).await?;

        match phase {
            Some(phase) => print_json(&ctx.reconciler.run_phase(phase).await?),
            None => print_json(&ctx.reconciler.run_full().await?),
        }
    }

    /// Print which phases would do work.
    pub async fn run_status(&self) -> Result<()> {
        let ctx = Context::connect(Config::load()?).await?;
        let pending = ctx.reconciler.pending().await?;

        if pending.is_converged() {
            tracing::info!("Links are consistent with exclusion rules");
        }
        print_json(&pending)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! CLI module for the distributor.
//!
//! Subcommands:
//! - `init`: Create the graph and its labels
//! - `serve`: Run the HTTP trigger server
//! - `reconcile`: Run the pipeline, or one phase, once
//! - `status`: Report which phases have pending work

mod init;
mod reconcile;
mod serve;

use clap::{Parser, Subcommand};

use crate::reconcile::Phase;

/// Keeps offering locations consistent with business exclusion rules
#[derive(Parser)]
#[command(name = "distributor")]
#[command(about = "Reconciles offering availability links with product group exclusions")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Ensure the graph and its vertex/edge labels exist
    Init,

    /// Run the HTTP trigger server
    Serve {
        /// Host address to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Reconcile links once and print the report
    Reconcile {
        /// Run only this phase
        #[arg(long, value_enum)]
        phase: Option<Phase>,
    },

    /// Print which phases have pending work, without changing anything
    Status,
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> color_eyre::Result<()> {
        match self.command {
            Command::Init => self.run_init().await,
            Command::Serve { ref host, port } => self.run_serve(host.as_deref(), port).await,
            Command::Reconcile { phase } => self.run_reconcile(phase).await,
            Command::Status => self.run_status().await,
        }
    }
}

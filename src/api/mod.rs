//! HTTP trigger layer.
//!
//! Every endpoint runs against the shared [`Reconciler`]; requests are not
//! serialized, so two overlapping triggers simply race on the store.
//!
//! | Method | Path | Action |
//! |--------|------|--------|
//! | GET  | `/health` | liveness |
//! | GET  | `/status` | pending violations per phase |
//! | POST | `/distribute` | all phases |
//! | POST | `/clean-suppliers-without-constraints` | cleanup-unconstrained |
//! | POST | `/add-suppliers` | fill-constrained |
//! | POST | `/remove-suppliers` | trim-constrained |
//! | POST | `/phases/{phase}` | any phase by name |

mod handlers;
mod types;

pub use handlers::ApiError;
pub use types::{ErrorResponse, HealthResponse, OkResponse};

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::reconcile::Reconciler;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/distribute", post(handlers::distribute_handler))
        .route(
            "/clean-suppliers-without-constraints",
            post(handlers::clean_suppliers_handler),
        )
        .route("/add-suppliers", post(handlers::add_suppliers_handler))
        .route("/remove-suppliers", post(handlers::remove_suppliers_handler))
        .route("/phases/{phase}", post(handlers::phase_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router until ctrl-c.
pub async fn run_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

//! Endpoint handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use super::types::{ErrorResponse, HealthResponse, OkResponse};
use super::AppState;
use crate::reconcile::{
    PendingViolations, Phase, PhaseReport, ReconcileError, ReconcileReport,
};

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("unknown phase: {0}")]
    UnknownPhase(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, phase) = match &self {
            ApiError::Reconcile(err) => (StatusCode::INTERNAL_SERVER_ERROR, Some(err.phase)),
            ApiError::UnknownPhase(_) => (StatusCode::NOT_FOUND, None),
        };

        if let ApiError::Reconcile(err) = &self {
            tracing::error!(code = err.source.code(), error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            status: "error".to_string(),
            code: status.as_u16().to_string(),
            message: self.to_string(),
            phase,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<OkResponse<T>>, ApiError>;

pub async fn root_handler() -> &'static str {
    "Hello from the offering location distributor"
}

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Which phases would currently do work. Read-only.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<PendingViolations> {
    let pending = state.reconciler.pending().await?;
    Ok(Json(OkResponse::new(pending)))
}

/// Runs every phase in order.
pub async fn distribute_handler(State(state): State<AppState>) -> ApiResult<ReconcileReport> {
    let report = state.reconciler.run_full().await?;
    Ok(Json(OkResponse::new(report)))
}

pub async fn clean_suppliers_handler(State(state): State<AppState>) -> ApiResult<PhaseReport> {
    run_phase(&state, Phase::CleanupUnconstrained).await
}

pub async fn add_suppliers_handler(State(state): State<AppState>) -> ApiResult<PhaseReport> {
    run_phase(&state, Phase::FillConstrained).await
}

pub async fn remove_suppliers_handler(State(state): State<AppState>) -> ApiResult<PhaseReport> {
    run_phase(&state, Phase::TrimConstrained).await
}

/// Runs the phase named in the path, e.g. `/phases/fill-constrained`.
pub async fn phase_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<PhaseReport> {
    let phase: Phase = name
        .parse()
        .map_err(|_| ApiError::UnknownPhase(name.clone()))?;
    run_phase(&state, phase).await
}

async fn run_phase(state: &AppState, phase: Phase) -> ApiResult<PhaseReport> {
    let report = state.reconciler.run_phase(phase).await?;
    Ok(Json(OkResponse::new(report)))
}

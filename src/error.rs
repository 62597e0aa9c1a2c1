//! Application error types.

use thiserror::Error;

/// Application-level errors for the distributor.
///
/// The three `Store*` variants form the failure taxonomy of the graph store
/// adapter. The reconciliation driver treats them identically: any of them
/// aborts the phase in progress.
#[derive(Error, Debug)]
pub enum AppError {
    // Graph store errors
    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Graph store query failed: {message}")]
    StoreQueryFailed { message: String, query: String },

    #[error("Graph store timed out: {0}")]
    StoreTimeout(String),

    // Domain errors
    #[error("Unknown phase: {0}")]
    InvalidPhase(String),

    #[error("Batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true for failures raised by the graph store adapter.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            AppError::StoreUnavailable(_)
                | AppError::StoreQueryFailed { .. }
                | AppError::StoreTimeout(_)
        )
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::StoreQueryFailed { .. } => "STORE_QUERY_FAILED",
            AppError::StoreTimeout(_) => "STORE_TIMEOUT",
            AppError::InvalidPhase(_) => "INVALID_PHASE",
            AppError::InvalidBatchSize(_) => "INVALID_BATCH_SIZE",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

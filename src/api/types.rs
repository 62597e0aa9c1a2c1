//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::reconcile::Phase;

/// Successful trigger: `{"status":"ok","report":...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse<T> {
    pub status: String,
    pub report: T,
}

impl<T> OkResponse<T> {
    pub fn new(report: T) -> Self {
        Self {
            status: "ok".to_string(),
            report,
        }
    }
}

/// Failed trigger, in the shape existing callers already parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    /// HTTP status code as a string.
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

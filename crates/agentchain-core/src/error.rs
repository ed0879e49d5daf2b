//! Core error types for agentchain.
//!
//! `ServerError` is used by the stores and the HTTP surface.
//! `EngineError` is the chain engine's taxonomy: setup errors surface as
//! `Err` from a run, mid-run errors are recorded against the failing step.
//! When the `axum` feature is enabled, both implement `IntoResponse`
//! so they can be used directly as axum handler error types.

use crate::capability::CapabilityError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No workflow contains step '{0}'")]
    WorkflowNotFound(String),

    #[error("Step '{0}' not found in workflow")]
    StepNotFound(String),

    #[error("Step '{step_id}' ({kind}) has no saved configuration")]
    StepNotConfigured { step_id: String, kind: String },

    #[error("Unsupported step kind '{0}'")]
    UnsupportedStepKind(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("Step '{0}' was already visited in this run")]
    CycleDetected(String),

    #[error("Run exceeded the limit of {0} steps")]
    StepLimitExceeded(usize),

    #[error(transparent)]
    Store(#[from] ServerError),
}

impl EngineError {
    /// Stable machine-readable code used in run records and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            EngineError::StepNotFound(_) => "STEP_NOT_FOUND",
            EngineError::StepNotConfigured { .. } => "STEP_NOT_CONFIGURED",
            EngineError::UnsupportedStepKind(_) => "UNSUPPORTED_STEP_KIND",
            EngineError::Capability(_) => "CAPABILITY_ERROR",
            EngineError::CycleDetected(_) => "CYCLE_DETECTED",
            EngineError::StepLimitExceeded(_) => "STEP_LIMIT_EXCEEDED",
            EngineError::Store(_) => "STORE_ERROR",
        }
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let (status, message) = match &self {
            ServerError::Database(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for EngineError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;
        use axum::response::IntoResponse;

        let status = match &self {
            EngineError::WorkflowNotFound(_) | EngineError::StepNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::UnsupportedStepKind(_) => StatusCode::BAD_REQUEST,
            EngineError::StepNotConfigured { .. }
            | EngineError::CycleDetected(_)
            | EngineError::StepLimitExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Capability(_) => StatusCode::BAD_GATEWAY,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let EngineError::Store(inner) = self {
            return inner.into_response();
        }

        let body = serde_json::json!({ "error": self.to_string(), "code": self.code() });
        (status, axum::Json(body)).into_response()
    }
}

pub mod auth;
pub mod steps;
pub mod workflows;

use axum::Router;

use agentchain_core::AppState;

pub use auth::Caller;

/// Build the complete API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/workflows", workflows::router())
        .nest("/api/steps", steps::router())
}

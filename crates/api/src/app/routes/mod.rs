use axum::Router;

pub mod jobs;
pub mod system;

/// Router for the versioned API surface (mounted under `/api/v1`).
pub fn router() -> Router {
    Router::new().nest("/jobs", jobs::router())
}

use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::app::{dto::HealthResponse, errors};

/// Liveness only; does not touch the database.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn not_found() -> axum::response::Response {
    errors::json_error(StatusCode::NOT_FOUND, errors::ROUTE_NOT_FOUND)
}

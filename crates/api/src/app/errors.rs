use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub const INVALID_JOB_ID: &str = "Invalid job_id format";
pub const JOB_NOT_FOUND: &str = "Job not found";
pub const INTERNAL_ERROR: &str = "Internal server error";
pub const ROUTE_NOT_FOUND: &str = "Not found";
pub const TOO_MANY_REQUESTS: &str = "Too many requests, please try again later.";

/// `{ "error": message }` with the given status. Never carries internal detail.
pub fn json_error(status: StatusCode, message: &'static str) -> Response {
    (status, axum::Json(json!({ "error": message }))).into_response()
}

pub fn invalid_job_id() -> Response {
    json_error(StatusCode::BAD_REQUEST, INVALID_JOB_ID)
}

pub fn job_not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, JOB_NOT_FOUND)
}

pub fn internal_error() -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
}

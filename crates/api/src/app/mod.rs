//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: export service wiring (Postgres or in-memory store)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use jobexport_infra::config::HttpConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the tests).
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// rate limiter can key clients by peer address.
pub fn build_app(services: AppServices, http: &HttpConfig) -> Router {
    let limiter = middleware::RateLimiter::per_second(http.rate_limit_per_second);

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", routes::router())
        .fallback(routes::system::not_found)
        .layer(Extension(Arc::new(services)))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::security_headers))
                .layer(axum::middleware::from_fn_with_state(
                    limiter,
                    middleware::rate_limit,
                )),
        )
}

//! HTTP API: routing, request/response mapping and edge middleware.

pub mod app;
pub mod middleware;

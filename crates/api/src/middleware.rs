use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::app::errors;

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    (
        "strict-transport-security",
        "max-age=15552000; includeSubDomains",
    ),
    ("content-security-policy", "default-src 'self'"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("x-dns-prefetch-control", "off"),
    ("x-permitted-cross-domain-policies", "none"),
];

/// Adds the standard hardening headers to every response.
pub async fn security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for &(name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}

/// Windows tracked before stale entries are swept.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Default)]
struct Clients {
    windows: HashMap<IpAddr, Window>,
    /// Sweeps run at most once per window length.
    last_sweep: Option<Instant>,
    sweeps: u64,
}

impl Clients {
    fn sweep_if_due(&mut self, now: Instant, span: Duration) {
        if self.windows.len() < PRUNE_THRESHOLD {
            return;
        }
        if let Some(last) = self.last_sweep {
            if now.saturating_duration_since(last) < span {
                return;
            }
        }

        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < span);
        self.last_sweep = Some(now);
        self.sweeps += 1;
    }
}

/// Per-client fixed-window request limiter.
#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    clients: Arc<Mutex<Clients>>,
}

impl RateLimiter {
    /// `limit` requests per client per `window`; a zero limit disables limiting.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            clients: Arc::new(Mutex::new(Clients::default())),
        }
    }

    pub fn per_second(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    /// Counts one request from `client` at `now`.
    ///
    /// Returns `Err(retry_after)` once the client has used up its window.
    pub fn check(&self, client: IpAddr, now: Instant) -> Result<(), Duration> {
        if !self.is_enabled() {
            return Ok(());
        }

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.sweep_if_due(now, self.window);

        let entry = clients.windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.limit {
            let elapsed = now.saturating_duration_since(entry.started);
            return Err(self.window.saturating_sub(elapsed));
        }

        entry.count += 1;
        Ok(())
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .windows
            .len()
    }

    #[cfg(test)]
    fn sweeps(&self) -> u64 {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sweeps
    }
}

/// Rejects clients over their window with 429 and `Retry-After`.
///
/// Requests without peer info (router not served with connect info) pass through.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(client) = client {
        if let Err(retry_after) = limiter.check(client, Instant::now()) {
            warn!(client = %client, "rate limit exceeded");
            let mut response = errors::json_error(StatusCode::TOO_MANY_REQUESTS, errors::TOO_MANY_REQUESTS);
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            return response;
        }
    }

    next.run(req).await
}

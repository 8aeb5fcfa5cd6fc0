//! Per-client fixed-window rate limiting.
//!
//! Each client address owns one window entry: a counter and the instant the
//! window resets. Check-and-increment runs under the entry's shard lock, so
//! concurrent requests from one client never lose an increment, and a window
//! reset happens in the same critical section as the increment. Counters are
//! never decremented; a request abandoned mid-flight still counts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitConfig;
use crate::http::request::client_address;
use crate::observability::metrics;
use crate::routing::matcher::PathPrefixMatcher;

/// Counter state for one client.
#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

impl RateDecision {
    fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// Write the `X-RateLimit-*` headers.
    pub fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(self.reset_secs()));
        if !self.allowed {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(self.reset_secs()));
        }
    }
}

/// Shared limiter state.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    mount: PathPrefixMatcher,
    enabled: bool,
    trust_proxy: bool,
    max_requests: u32,
    window: Duration,
    message: String,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, trust_proxy: bool) -> Self {
        Self {
            windows: DashMap::new(),
            mount: PathPrefixMatcher::new(config.mount_path.clone()),
            enabled: config.enabled,
            trust_proxy,
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            message: config.message.clone(),
        }
    }

    /// True if requests to `path` are counted.
    pub fn applies_to(&self, path: &str) -> bool {
        self.enabled && self.mount.matches_path(path)
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Count one request from `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            count: 0,
            reset_at: now + self.window,
        });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        entry.count = entry.count.saturating_add(1);

        RateDecision {
            allowed: entry.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_after: entry.reset_at.saturating_duration_since(now),
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Drop every window that has elapsed by `now`. Returns the number removed.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| w.reset_at > now);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Periodically purge expired windows until shutdown.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = self.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, tracked = self.tracked_clients(), "Purged expired rate-limit windows");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Rate-limit sweeper stopped");
                        break;
                    }
                }
            }
        })
    }
}

/// Middleware for per-client rate limiting on the mount path.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.applies_to(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_address(&request, limiter.trust_proxy);
    let decision = limiter.check(&key);

    if !decision.allowed {
        tracing::warn!(client = %key, limit = decision.limit, "Rate limit exceeded");
        metrics::record_rate_limited();
        let mut response = Response::new(Body::from(limiter.message.clone()));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        decision.write_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    decision.write_headers(response.headers_mut());
    response
}

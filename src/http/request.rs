//! Per-request context: client address, cookies, arrival time, deadline.
//!
//! Everything attached here lives in the request's extensions and is dropped
//! with the request.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use cookie::Cookie;

use crate::error::AppError;

/// Resolve the client address used as the rate-limit key.
///
/// With `trust_proxy`, the left-most `X-Forwarded-For` entry wins; otherwise
/// the TCP peer address. Falls back to `"unknown"`.
pub fn client_address(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(addr) = forwarded_for(request.headers()) {
            return addr;
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Arrival timestamp of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTime(pub DateTime<Utc>);

impl RequestTime {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// ISO-8601 form, millisecond precision.
    pub fn to_iso(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl<S> FromRequestParts<S> for RequestTime
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestTime>()
            .copied()
            .unwrap_or_else(RequestTime::now))
    }
}

pub async fn tag_request_time(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestTime::now());
    next.run(request).await
}

/// Total time allowed for producing a response.
#[derive(Debug, Clone, Copy)]
pub struct RequestDeadline(pub Duration);

/// Fail the request with a 408 once the deadline passes.
pub async fn enforce_deadline(
    State(RequestDeadline(limit)): State<RequestDeadline>,
    request: Request,
    next: Next,
) -> Response {
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(timeout_ms = limit.as_millis() as u64, "Request timed out");
            AppError::new("Request timed out", StatusCode::REQUEST_TIMEOUT).into_response()
        }
    }
}

/// Cookies sent with the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(BTreeMap<String, String>);

impl Cookies {
    /// Parse every `Cookie` header, percent-decoding values. Later pairs
    /// overwrite earlier ones; malformed pairs are skipped.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = BTreeMap::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            for cookie in Cookie::split_parse_encoded(value).flatten() {
                cookies.insert(cookie.name().to_string(), cookie.value_trimmed().to_string());
            }
        }
        Self(cookies)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> FromRequestParts<S> for Cookies
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<Cookies>() {
            Some(cookies) => cookies.clone(),
            None => Cookies::from_headers(&parts.headers),
        })
    }
}

pub async fn parse_cookies(mut request: Request, next: Next) -> Response {
    let cookies = Cookies::from_headers(request.headers());
    request.extensions_mut().insert(cookies);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(headers: &[(&str, &str)]) -> Request {
        let mut builder = Request::builder().uri("/api/v1/tours");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_client_address_prefers_forwarded_for() {
        let mut req = request_with(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));

        assert_eq!(client_address(&req, true), "203.0.113.9");
        assert_eq!(client_address(&req, false), "127.0.0.1");
    }

    #[test]
    fn test_client_address_unknown() {
        let req = request_with(&[]);
        assert_eq!(client_address(&req, true), "unknown");
    }

    #[test]
    fn test_cookie_parsing() {
        let req = request_with(&[("cookie", "jwt=abc.def; theme=\"dark\"; broken; =x")]);
        let cookies = Cookies::from_headers(req.headers());
        assert_eq!(cookies.get("jwt"), Some("abc.def"));
        assert_eq!(cookies.get("theme"), Some("dark"));
        assert_eq!(cookies.len(), 2);
    }

    #[test]
    fn test_cookie_values_are_percent_decoded() {
        let req = request_with(&[
            ("cookie", "greeting=hello%20world; jwt=first"),
            ("cookie", "jwt=second"),
        ]);
        let cookies = Cookies::from_headers(req.headers());
        assert_eq!(cookies.get("greeting"), Some("hello world"));
        assert_eq!(cookies.get("jwt"), Some("second"));
    }

    #[test]
    fn test_request_time_iso() {
        let t = RequestTime(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        assert_eq!(t.to_iso(), "2023-11-14T22:13:20.000Z");
    }
}

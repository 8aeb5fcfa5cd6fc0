//! Body parsing stage.
//!
//! JSON and URL-encoded bodies are buffered up to a fixed ceiling, decoded
//! into a JSON value and stored on the request for the sanitization and
//! de-duplication stages and for handlers. Other content types pass through
//! with their body untouched. The query string is parsed here as well, so
//! later stages see one structured view of the input.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::http::params::QueryParams;
use crate::observability::metrics;

/// Wire format of a parsed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Form,
}

impl BodyKind {
    /// Detect the body kind from `Content-Type`.
    pub fn detect(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json")) {
            Some(BodyKind::Json)
        } else if mime == "application/x-www-form-urlencoded" {
            Some(BodyKind::Form)
        } else {
            None
        }
    }
}

/// Parsed request body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    kind: BodyKind,
    value: Value,
}

impl RequestBody {
    pub fn new(kind: BodyKind, value: Value) -> Self {
        Self { kind, value }
    }

    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }
}

/// Ceiling for parsed bodies.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

/// Decode a JSON body. Empty input is an empty object.
pub fn decode_json(bytes: &[u8]) -> Result<Value, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|e| AppError::MalformedBody(e.to_string()))
}

/// Decode a URL-encoded body. Repeated keys become arrays.
pub fn decode_form(bytes: &[u8]) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(map)
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

pub async fn parse_body_middleware(
    State(BodyLimit(limit)): State<BodyLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    parts
        .extensions
        .insert(QueryParams::parse(parts.uri.query()));

    let Some(kind) = BodyKind::detect(&parts.headers) else {
        return Ok(next.run(Request::from_parts(parts, body)).await);
    };

    if let Some(length) = declared_length(&parts.headers) {
        if length > limit {
            metrics::record_payload_rejected();
            tracing::warn!(length, limit, path = %parts.uri.path(), "Request body exceeds limit");
            return Err(AppError::PayloadTooLarge { limit });
        }
    }

    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        metrics::record_payload_rejected();
        tracing::warn!(limit, error = %e, path = %parts.uri.path(), "Request body rejected while reading");
        AppError::PayloadTooLarge { limit }
    })?;

    let value = match kind {
        BodyKind::Json => decode_json(&bytes)?,
        BodyKind::Form => decode_form(&bytes),
    };
    parts.extensions.insert(RequestBody::new(kind, value));

    // Handlers read the parsed value; the byte stream is consumed.
    Ok(next.run(Request::from_parts(parts, Body::empty())).await)
}

/// The parsed body. Requests without one yield an empty object.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload(pub Value);

impl<S> FromRequestParts<S> for RawPayload
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RawPayload(
            parts
                .extensions
                .get::<RequestBody>()
                .map(|b| b.value().clone())
                .unwrap_or_else(|| Value::Object(Map::new())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(BodyKind::detect(&headers("application/json; charset=utf-8")), Some(BodyKind::Json));
        assert_eq!(BodyKind::detect(&headers("application/merge-patch+json")), Some(BodyKind::Json));
        assert_eq!(BodyKind::detect(&headers("application/x-www-form-urlencoded")), Some(BodyKind::Form));
        assert_eq!(BodyKind::detect(&headers("multipart/form-data; boundary=x")), None);
        assert_eq!(BodyKind::detect(&HeaderMap::new()), None);
    }

    #[test]
    fn test_decode_json() {
        assert_eq!(decode_json(b"").unwrap(), json!({}));
        assert_eq!(decode_json(b" {\"a\": 1} ").unwrap(), json!({ "a": 1 }));
        assert!(matches!(decode_json(b"{\"a\":"), Err(AppError::MalformedBody(_))));
    }

    #[test]
    fn test_decode_form_repeated_keys() {
        let value = decode_form(b"name=Test+Tour&price=100&price=200&price=300");
        assert_eq!(value, json!({ "name": "Test Tour", "price": ["100", "200", "300"] }));
    }
}

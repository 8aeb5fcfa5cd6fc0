//! Input sanitization.
//!
//! Two passes over every parsed body and query value:
//! - keys that could be read as query operators (`$gt`, `a.b`) are dropped,
//!   including bracketed segments such as `price[$gt]`;
//! - `<` and `>` in string values are escaped so stored text cannot carry markup.
//!
//! The stage never rejects a request; it rewrites fields in place.

use std::borrow::Cow;

use axum::{extract::Request, middleware::Next, response::Response};
use serde_json::Value;

use crate::http::body::RequestBody;
use crate::http::params::QueryParams;

/// Split `price[gte][x]` into `["price", "gte", "x"]`.
pub fn key_segments(key: &str) -> impl Iterator<Item = &str> {
    key.split(['[', ']']).filter(|s| !s.is_empty())
}

/// True if any segment of `key` starts with `$` or contains `.`.
pub fn is_injection_key(key: &str) -> bool {
    key_segments(key).any(|s| s.starts_with('$') || s.contains('.'))
}

/// Escape angle brackets. Borrowed when nothing needs escaping.
pub fn escape_markup(input: &str) -> Cow<'_, str> {
    if !input.contains(['<', '>']) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Sanitize a JSON value in place. Returns the number of edits made.
pub fn sanitize_value(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !is_injection_key(key));
            let removed = before - map.len();
            removed + map.values_mut().map(sanitize_value).sum::<usize>()
        }
        Value::Array(items) => items.iter_mut().map(sanitize_value).sum(),
        Value::String(s) => match escape_markup(s) {
            Cow::Owned(escaped) => {
                *s = escaped;
                1
            }
            Cow::Borrowed(_) => 0,
        },
        _ => 0,
    }
}

pub async fn sanitize_middleware(mut request: Request, next: Next) -> Response {
    let mut edits = 0;

    if let Some(body) = request.extensions_mut().get_mut::<RequestBody>() {
        edits += sanitize_value(body.value_mut());
    }
    if let Some(query) = request.extensions_mut().get_mut::<QueryParams>() {
        edits += query.sanitize();
    }

    if edits > 0 {
        tracing::debug!(edits, path = %request.uri().path(), "Sanitized request input");
    }

    next.run(request).await
}

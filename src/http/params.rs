//! Query parameters and HTTP parameter pollution handling.
//!
//! The query string is parsed once into an ordered multi-map. The
//! de-duplication stage then collapses every repeated key to its last value,
//! except for allow-listed keys whose values are kept as a collection so that
//! range filters like `?price=100&price=200` survive.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::http::body::{BodyKind, RequestBody};
use crate::security::sanitize::{escape_markup, is_injection_key};

/// Base name of a bracketed key: `price[gte]` → `price`.
pub fn base_name(key: &str) -> &str {
    key.split('[').next().unwrap_or(key)
}

/// Parameters that may legitimately repeat.
#[derive(Debug, Clone, Default)]
pub struct ParamWhitelist(Arc<BTreeSet<String>>);

impl ParamWhitelist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Arc::new(names.into_iter().map(Into::into).collect()))
    }

    pub fn allows(&self, key: &str) -> bool {
        self.0.contains(base_name(key))
    }
}

/// Parsed query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: BTreeMap<String, Vec<String>>,
    polluted: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let mut values: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(query) = query {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                if key.is_empty() {
                    continue;
                }
                values.entry(key.into_owned()).or_default().push(value.into_owned());
            }
        }
        Self {
            values,
            polluted: BTreeMap::new(),
        }
    }

    /// Last value supplied for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.last()).map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.values.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_multi(&self, key: &str) -> bool {
        self.get_all(key).len() > 1
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Duplicates removed by [`QueryParams::dedupe`].
    pub fn polluted(&self) -> &BTreeMap<String, Vec<String>> {
        &self.polluted
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop operator keys and escape markup in values. Returns the edit count.
    pub fn sanitize(&mut self) -> usize {
        let before = self.values.len();
        self.values.retain(|key, _| !is_injection_key(key));
        let mut edits = before - self.values.len();

        for value in self.values.values_mut().flatten() {
            if let std::borrow::Cow::Owned(escaped) = escape_markup(value) {
                *value = escaped;
                edits += 1;
            }
        }
        edits
    }

    /// Keep only the last value of every repeated, non-allow-listed key.
    pub fn dedupe(&mut self, whitelist: &ParamWhitelist) {
        for (key, values) in self.values.iter_mut() {
            if values.len() > 1 && !whitelist.allows(key) {
                let all = std::mem::take(values);
                values.push(all.last().cloned().unwrap_or_default());
                self.polluted.insert(key.clone(), all);
            }
        }
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<QueryParams>() {
            Some(query) => query.clone(),
            None => QueryParams::parse(parts.uri.query()),
        })
    }
}

/// Collapse repeated top-level form fields the same way as query keys.
fn dedupe_form_body(body: &mut Value, whitelist: &ParamWhitelist) {
    let Value::Object(map) = body else { return };
    for (key, value) in map.iter_mut() {
        if whitelist.allows(key) {
            continue;
        }
        if let Value::Array(items) = value {
            if let Some(last) = items.pop() {
                *value = last;
            }
        }
    }
}

pub async fn dedupe_params_middleware(
    State(whitelist): State<ParamWhitelist>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(query) = request.extensions_mut().get_mut::<QueryParams>() {
        query.dedupe(&whitelist);
        if !query.polluted().is_empty() {
            tracing::debug!(keys = ?query.polluted().keys().collect::<Vec<_>>(), "Collapsed repeated query parameters");
        }
    }

    if let Some(body) = request.extensions_mut().get_mut::<RequestBody>() {
        if body.kind() == BodyKind::Form {
            dedupe_form_body(body.value_mut(), &whitelist);
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn whitelist() -> ParamWhitelist {
        ParamWhitelist::new([
            "duration",
            "ratingsAverage",
            "ratingsQuantity",
            "maxGroupSize",
            "difficulty",
            "price",
        ])
    }

    #[test]
    fn test_parse_repeated_keys() {
        let q = QueryParams::parse(Some("sort=price&sort=duration&price%5Bgte%5D=500&name=The+Forest"));
        assert_eq!(q.get_all("sort"), ["price", "duration"]);
        assert_eq!(q.get("price[gte]"), Some("500"));
        assert_eq!(q.get("name"), Some("The Forest"));
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_dedupe_keeps_whitelisted_collections() {
        let mut q = QueryParams::parse(Some("price=100&price=200&sort=price&sort=duration&difficulty=easy"));
        q.dedupe(&whitelist());

        assert_eq!(q.get_all("price"), ["100", "200"]);
        assert!(q.is_multi("price"));
        assert_eq!(q.get_all("sort"), ["duration"]);
        assert_eq!(q.polluted()["sort"], vec!["price".to_string(), "duration".to_string()]);
        assert_eq!(q.get_all("difficulty"), ["easy"]);
    }

    #[test]
    fn test_every_whitelisted_field_stays_multi() {
        for field in ["duration", "ratingsAverage", "ratingsQuantity", "maxGroupSize", "difficulty", "price"] {
            let raw = format!("{field}=1&{field}=2&other=1&other=2");
            let mut q = QueryParams::parse(Some(raw.as_str()));
            q.dedupe(&whitelist());
            assert_eq!(q.get_all(field), ["1", "2"], "{field} should keep both values");
            assert_eq!(q.get_all("other"), ["2"]);
        }
    }

    #[test]
    fn test_whitelist_uses_base_name() {
        let mut q = QueryParams::parse(Some("price[gte]=1&price[gte]=2"));
        q.dedupe(&whitelist());
        assert!(q.is_multi("price[gte]"));
    }

    #[test]
    fn test_query_sanitize() {
        let mut q = QueryParams::parse(Some("price[$gt]=1&name=%3Cb%3E&limit=5"));
        assert_eq!(q.sanitize(), 2);
        assert_eq!(q.get("price[$gt]"), None);
        assert_eq!(q.get("name"), Some("&lt;b&gt;"));
        assert_eq!(q.get("limit"), Some("5"));
    }

    #[test]
    fn test_dedupe_form_body() {
        let mut body = json!({ "name": ["a", "b"], "price": ["1", "2"], "x": "y" });
        dedupe_form_body(&mut body, &whitelist());
        assert_eq!(body, json!({ "name": "b", "price": ["1", "2"], "x": "y" }));
    }
}

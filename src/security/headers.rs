//! Fixed security response headers.
//!
//! The header set is compiled once from configuration at startup and applied
//! to every response, including rejections produced by inner stages.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::config::{CspDirective, SecurityConfig};

/// Error raised when a configured header cannot be encoded.
#[derive(Debug, thiserror::Error)]
#[error("invalid security header '{name}'")]
pub struct InvalidHeader {
    pub name: String,
}

/// Immutable list of response headers.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Arc<[(HeaderName, HeaderValue)]>,
}

impl SecurityHeaders {
    /// Compile the configured policy into header pairs.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, InvalidHeader> {
        let mut headers = Vec::with_capacity(config.headers.len() + 1);

        if !config.csp.is_empty() {
            let policy = Self::policy_string(&config.csp);
            let value = HeaderValue::from_str(&policy).map_err(|_| InvalidHeader {
                name: header::CONTENT_SECURITY_POLICY.to_string(),
            })?;
            headers.push((header::CONTENT_SECURITY_POLICY, value));
        }

        for h in &config.headers {
            let invalid = || InvalidHeader { name: h.name.clone() };
            let name = HeaderName::from_bytes(h.name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(&h.value).map_err(|_| invalid())?;
            headers.push((name, value));
        }

        Ok(Self {
            headers: headers.into(),
        })
    }

    /// Serialize directives as `name src src; name src`.
    pub fn policy_string(directives: &[CspDirective]) -> String {
        directives
            .iter()
            .map(|d| {
                if d.sources.is_empty() {
                    d.name.clone()
                } else {
                    format!("{} {}", d.name, d.sources.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HeaderName, HeaderValue)> {
        self.headers.iter()
    }

    /// Overwrite the headers on a response.
    pub fn apply(&self, response: &mut Response) {
        let target = response.headers_mut();
        for (name, value) in self.headers.iter() {
            target.insert(name.clone(), value.clone());
        }
    }
}

pub async fn security_headers_middleware(
    State(headers): State<SecurityHeaders>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    headers.apply(&mut response);
    response
}

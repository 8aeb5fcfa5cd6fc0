//! Centralized error rendering.
//!
//! Every inner stage and handler reports failures as an [`AppError`], which
//! travels outward as an [`ErrorReport`] response extension. This stage is
//! the one place that decides what the client sees:
//!
//! | environment | error kind  | body                                          |
//! |-------------|-------------|-----------------------------------------------|
//! | development | any         | status, message, error details, stack         |
//! | production  | operational | status, message                               |
//! | production  | unexpected  | 500 with a generic message                    |
//!
//! Paths outside `/api` get an HTML page instead of JSON.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::config::Environment;
use crate::error::{AppError, ErrorReport, GENERIC_MESSAGE};
use crate::routing::matcher::PathPrefixMatcher;
use crate::views::{self, ViewRenderer};

const PAGE_TITLE: &str = "Something went wrong!";
const PAGE_RETRY_MESSAGE: &str = "Please try again later.";

/// Formats errors for clients according to the runtime environment.
#[derive(Clone)]
pub struct ErrorRenderer {
    environment: Environment,
    views: Arc<dyn ViewRenderer>,
    api: PathPrefixMatcher,
}

impl ErrorRenderer {
    pub fn new(environment: Environment, views: Arc<dyn ViewRenderer>) -> Self {
        Self {
            environment,
            views,
            api: PathPrefixMatcher::new("/api"),
        }
    }

    /// JSON error body.
    pub fn json_body(&self, error: &AppError) -> Value {
        if self.environment.is_development() {
            return json!({
                "status": error.status_label(),
                "message": error.to_string(),
                "error": {
                    "statusCode": error.status_code().as_u16(),
                    "status": error.status_label(),
                    "isOperational": error.is_operational(),
                    "kind": error.kind(),
                },
                "stack": error.diagnostic(),
            });
        }
        if error.is_operational() {
            json!({ "status": error.status_label(), "message": error.to_string() })
        } else {
            json!({ "status": "error", "message": GENERIC_MESSAGE })
        }
    }

    /// Message shown on the HTML error page.
    pub fn page_message(&self, error: &AppError) -> String {
        if self.environment.is_development() || error.is_operational() {
            error.to_string()
        } else {
            PAGE_RETRY_MESSAGE.to_string()
        }
    }

    fn status(&self, error: &AppError) -> StatusCode {
        if error.is_operational() {
            error.status_code()
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn render(&self, path: &str, error: &AppError) -> Response {
        let status = self.status(error);
        if self.api.matches_path(path) {
            return (status, Json(self.json_body(error))).into_response();
        }

        let context = json!({ "title": PAGE_TITLE, "msg": self.page_message(error) });
        match self.views.render(views::ERROR, &context) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                tracing::error!(error = %e.diagnostic(), "Failed to render error page");
                (status, Json(self.json_body(error))).into_response()
            }
        }
    }
}

fn log_error(path: &str, error: &AppError) {
    if error.is_operational() {
        tracing::debug!(path, status = error.status_code().as_u16(), kind = error.kind(), message = %error, "Request failed");
    } else {
        tracing::error!(path, kind = error.kind(), error = %error.diagnostic(), "Unexpected error");
    }
}

/// Headers describing the discarded body. The rendered body brings its own.
const BODY_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_ENCODING,
    header::VARY,
];

/// Headers from the failed response that survive re-rendering.
fn carry_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from {
        if BODY_HEADERS.contains(name) {
            continue;
        }
        to.insert(name.clone(), value.clone());
    }
}

pub async fn render_errors(
    State(renderer): State<ErrorRenderer>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };
    log_error(&path, report.error());

    let mut rendered = renderer.render(&path, report.error());
    carry_headers(response.headers(), rendered.headers_mut());
    rendered
}

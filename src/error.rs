//! Application error type.
//!
//! Every stage and handler reports failures as [`AppError`]. Converting an
//! error into a response only attaches an [`ErrorReport`]; the body a client
//! sees is decided by the error renderer in `http::response`.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::payments::WebhookError;
use crate::store::StoreError;

/// Message shown to clients for unexpected errors in production.
pub const GENERIC_MESSAGE: &str = "Something went very wrong!";

/// Errors raised while serving a request.
#[derive(Debug, Error)]
pub enum AppError {
    /// Known failure with a client-safe message.
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    /// No route or file matched the original URL.
    #[error("Can't find {0} on this server!")]
    RouteNotFound(String),

    /// Body exceeded the configured ceiling.
    #[error("request entity too large")]
    PayloadTooLarge { limit: usize },

    /// Body could not be decoded.
    #[error("Invalid request body: {0}")]
    MalformedBody(String),

    /// A document id that is not a UUID.
    #[error("Invalid id: {0}.")]
    InvalidId(String),

    /// Document failed validation.
    #[error("Invalid input data. {}", .0.join(". "))]
    Validation(Vec<String>),

    /// Webhook signature or payload rejected.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Document store failed.
    #[error("document store failure")]
    Store(#[from] StoreError),

    /// Unexpected failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),

    /// A handler panicked.
    #[error("handler panicked: {0}")]
    Panic(String),
}

impl AppError {
    /// Operational error with an explicit status.
    pub fn new(message: impl Into<String>, status: StatusCode) -> Self {
        AppError::Operational {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Operational { status, .. } => *status,
            AppError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::MalformedBody(_) | AppError::InvalidId(_) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Webhook(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Internal(_) | AppError::Panic(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True if the message is safe to show to clients.
    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            AppError::Store(_) | AppError::Internal(_) | AppError::Panic(_)
        )
    }

    /// `fail` for client errors, `error` otherwise.
    pub fn status_label(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Operational { .. } => "operational",
            AppError::RouteNotFound(_) => "route_not_found",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::MalformedBody(_) => "malformed_body",
            AppError::InvalidId(_) => "invalid_id",
            AppError::Validation(_) => "validation",
            AppError::Webhook(_) => "webhook",
            AppError::Store(_) => "store",
            AppError::Internal(_) => "internal",
            AppError::Panic(_) => "panic",
        }
    }

    /// Full diagnostic text: the message and every source below it.
    pub fn diagnostic(&self) -> String {
        if let AppError::Internal(err) = self {
            return format!("{err:?}");
        }
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }

    /// Message a client may see in production.
    pub fn public_message(&self) -> String {
        if self.is_operational() {
            self.to_string()
        } else {
            GENERIC_MESSAGE.to_string()
        }
    }
}

/// Error attached to a response for the renderer.
#[derive(Debug, Clone)]
pub struct ErrorReport(pub Arc<AppError>);

impl ErrorReport {
    pub fn error(&self) -> &AppError {
        &self.0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.public_message()).into_response();
        response.extensions_mut().insert(ErrorReport(Arc::new(self)));
        response
    }
}

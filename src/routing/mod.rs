//! Route groups.
//!
//! # Data Flow
//! ```text
//! Parsed request
//!     → pages.rs     GET /, GET /tour/{slug}
//!     → resources.rs /api/v1/{tours,users,reviews,bookings}
//!     → static files
//!     → not_found   (no route, method or file matched)
//!
//! Raw request (bypasses parsing stages):
//!     → webhook.rs   POST /webhook-checkout
//! ```

pub mod matcher;
pub mod pages;
pub mod resources;
pub mod webhook;

use axum::extract::OriginalUri;

use crate::error::AppError;

/// Terminal fallback: nothing matched the URL as received.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::RouteNotFound(uri.to_string())
}

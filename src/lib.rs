//! Tour booking web server.
//!
//! An ordered middleware pipeline (security headers, rate limiting, body
//! parsing, input sanitization, parameter de-duplication, compression)
//! in front of server-rendered pages, four REST resource groups, a
//! raw-body payment webhook and a centralized error renderer.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod payments;
pub mod routing;
pub mod security;
pub mod store;
pub mod views;

pub use config::AppConfig;
pub use error::AppError;
pub use http::{build_router, AppState, HttpServer};
pub use lifecycle::Shutdown;

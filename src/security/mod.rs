//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Response path (every response):
//!     → headers.rs (CSP and hardening headers)
//!     → cors.rs (cross-origin headers, preflight)
//!
//! Incoming request:
//!     → rate_limit.rs (per-client window on the /api mount)
//!     → [body parsing]
//!     → sanitize.rs (operator keys and markup removed)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Policies compiled once at startup from config
//! - Rejections short-circuit before any handler runs
//! - Sanitization rewrites, never rejects

pub mod cors;
pub mod headers;
pub mod rate_limit;
pub mod sanitize;

pub use cors::cors_layer;
pub use headers::{security_headers_middleware, SecurityHeaders};
pub use rate_limit::{rate_limit_middleware, RateDecision, RateLimiter};
pub use sanitize::sanitize_middleware;

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request
//!     → logging::access_log (development only)
//!     → metrics::track_metrics (always)
//!     → inner stages record rejections (rate limit, body size, webhook)
//!
//! Consumers:
//!     → stdout (pretty in development, JSON in production)
//!     → Prometheus scrape endpoint (when enabled)
//! ```

pub mod logging;
pub mod metrics;

pub use self::logging::{access_log, init_logging};
pub use self::metrics::{init_metrics, track_metrics};

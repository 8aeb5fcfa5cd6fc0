//! Payment provider integration.
//!
//! # Data Flow
//! ```text
//! POST /webhook-checkout (raw bytes + signature header)
//!     → webhook.rs (verify HMAC over the unmodified body)
//!     → types.rs (decode CheckoutEvent)
//!     → routing::bookings (create booking document)
//! ```

pub mod types;
pub mod webhook;

pub use types::{CheckoutEvent, CheckoutSession, CHECKOUT_COMPLETED};
pub use webhook::{HmacVerifier, WebhookError, WebhookVerifier};

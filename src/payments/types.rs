//! Payment provider event types.

use serde::{Deserialize, Serialize};

/// Event type emitted when a hosted checkout completes.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// A verified event delivered to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub object: CheckoutSession,
}

/// The checkout session carried by a completion event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Id of the tour that was purchased.
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Amount in the smallest currency unit.
    #[serde(default)]
    pub amount_total: Option<i64>,
}

impl CheckoutEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.kind == CHECKOUT_COMPLETED
    }
}

impl CheckoutSession {
    /// Amount in whole currency units.
    pub fn price(&self) -> Option<f64> {
        self.amount_total.map(|cents| cents as f64 / 100.0)
    }
}

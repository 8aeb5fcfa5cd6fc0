//! Payment webhook route.
//!
//! Mounted outside the parsing stages: the handler receives the request body
//! exactly as sent, since the signature covers those bytes.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Map, Value};

use crate::error::AppError;
use crate::http::server::AppState;
use crate::observability::metrics::record_webhook;
use crate::payments::{CheckoutSession, WebhookError};
use crate::routing::not_found;
use crate::store::{Collection, Document, DocumentQuery, DocumentStore};

pub const WEBHOOK_PATH: &str = "/webhook-checkout";

pub fn webhook_routes(raw_limit: usize) -> Router<AppState> {
    Router::new().route(
        WEBHOOK_PATH,
        post(webhook_checkout)
            .fallback(not_found)
            .layer(DefaultBodyLimit::max(raw_limit)),
    )
}

async fn webhook_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, AppError> {
    let limit = state.config.body.raw_limit_bytes;
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::MalformedBody(rejection.body_text())
        }
    })?;

    let Some(verifier) = state.verifier.as_ref() else {
        record_webhook("disabled");
        return Err(AppError::new(
            "Payment webhooks are not configured",
            StatusCode::SERVICE_UNAVAILABLE,
        ));
    };

    let signature = headers
        .get(state.config.payments.signature_header.as_str())
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)
        .inspect_err(|_| record_webhook("rejected"))?;

    let event = verifier.verify(&body, signature).inspect_err(|e| {
        record_webhook("rejected");
        tracing::warn!(error = %e, "Webhook signature rejected");
    })?;

    if event.is_checkout_completed() {
        let booking = create_booking(state.store.as_ref(), &event.data.object).await?;
        tracing::info!(booking = %booking.id, event = ?event.id, "Booking created from checkout");
        record_webhook("accepted");
    } else {
        tracing::debug!(kind = %event.kind, "Ignoring webhook event");
        record_webhook("ignored");
    }

    Ok(Json(json!({ "received": true })))
}

/// Book the purchased tour for the customer who paid.
pub async fn create_booking(
    store: &dyn DocumentStore,
    session: &CheckoutSession,
) -> Result<Document, AppError> {
    let invalid = |reason: &str| AppError::from(WebhookError::InvalidPayload(reason.to_string()));

    let tour = session
        .client_reference_id
        .clone()
        .ok_or_else(|| invalid("missing client_reference_id"))?;
    let email = session
        .customer_email
        .clone()
        .ok_or_else(|| invalid("missing customer_email"))?;
    let price = session
        .price()
        .ok_or_else(|| invalid("missing amount_total"))?;

    let user = store
        .find(Collection::Users, DocumentQuery::field_equals("email", email.as_str()))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| invalid("no user with the customer email"))?;

    let mut fields = Map::new();
    fields.insert("tour".to_string(), Value::String(tour));
    fields.insert("user".to_string(), Value::String(user.id.to_string()));
    fields.insert("price".to_string(), json!(price));
    fields.insert("paid".to_string(), Value::Bool(true));

    Ok(store.insert(Collection::Bookings, fields).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn session(email: &str) -> CheckoutSession {
        CheckoutSession {
            client_reference_id: Some("tour-1".to_string()),
            customer_email: Some(email.to_string()),
            amount_total: Some(49_700),
        }
    }

    #[tokio::test]
    async fn test_booking_links_user_by_email() {
        let store = InMemoryStore::new();
        let Value::Object(user) = json!({ "name": "Lisa", "email": "lisa@example.com" }) else {
            unreachable!()
        };
        let user = store.insert(Collection::Users, user).await.unwrap();

        let booking = create_booking(&store, &session("lisa@example.com")).await.unwrap();
        assert_eq!(booking.fields["tour"], json!("tour-1"));
        assert_eq!(booking.fields["user"], json!(user.id.to_string()));
        assert_eq!(booking.fields["price"], json!(497.0));
        assert_eq!(store.len(Collection::Bookings), 1);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_rejected() {
        let store = InMemoryStore::new();
        let err = create_booking(&store, &session("ghost@example.com")).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(store.len(Collection::Bookings), 0);
    }
}

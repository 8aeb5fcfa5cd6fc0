//! Webhook signature verification.
//!
//! Signatures use the `t=<unix seconds>,v1=<hex hmac>` header scheme: the
//! HMAC-SHA256 of `"<t>.<raw body>"` under the shared secret. Verification
//! must see the body exactly as sent, which is why the webhook route sits
//! outside the body parsing stage.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::payments::types::CheckoutEvent;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a webhook delivery is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("unable to parse signature header")]
    MalformedHeader,

    #[error("timestamp outside the tolerance zone")]
    TimestampOutOfTolerance,

    #[error("no signatures found matching the expected signature for payload")]
    SignatureMismatch,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Verifies a raw webhook delivery and decodes its event.
pub trait WebhookVerifier: Send + Sync {
    fn verify(&self, payload: &[u8], signature: &str) -> Result<CheckoutEvent, WebhookError>;
}

/// HMAC-SHA256 verifier with a timestamp tolerance.
#[derive(Clone)]
pub struct HmacVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for HmacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| WebhookError::MalformedHeader)?);
                }
                "v1" => {
                    if let Ok(sig) = hex::decode(value) {
                        signatures.push(sig);
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(WebhookError::SignatureMismatch);
        }
        Ok(Self { timestamp, signatures })
    }
}

impl HmacVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    fn mac(&self, payload: &[u8], timestamp: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("hmac can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }

    /// Produce a signature header for `payload` signed at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let digest = self.mac(payload, timestamp).finalize().into_bytes();
        format!("t={timestamp},v1={}", hex::encode(digest))
    }

    /// Verify against an explicit clock reading (unix seconds).
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: i64,
    ) -> Result<CheckoutEvent, WebhookError> {
        let parsed = SignatureHeader::parse(header)?;

        let matched = parsed
            .signatures
            .iter()
            .any(|sig| self.mac(payload, parsed.timestamp).verify_slice(sig).is_ok());
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        if now.abs_diff(parsed.timestamp) > self.tolerance.as_secs() {
            return Err(WebhookError::TimestampOutOfTolerance);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }
}

impl WebhookVerifier for HmacVerifier {
    fn verify(&self, payload: &[u8], signature: &str) -> Result<CheckoutEvent, WebhookError> {
        self.verify_at(payload, signature, Utc::now().timestamp())
    }
}

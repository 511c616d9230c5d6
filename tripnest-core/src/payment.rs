use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Request(String),

    #[error("Gateway responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Gateway returned malformed body: {0}")]
    Malformed(String),

    #[error("Gateway request timed out after {0:?}")]
    Timeout(Duration),
}

/// Gateway-side payment object. `reference` is the provider's id (e.g. pi_123).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub reference: String,
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Declined { reason: String },
}

/// External card-processing provider.
///
/// One round trip per call, no built-in retry. Callers must not confirm an
/// intent that has already succeeded.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount_minor_units` (cents for USD)
    async fn create_payment_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Confirm a payment intent with the guest's payment method
    async fn confirm_payment(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<PaymentOutcome, GatewayError>;
}

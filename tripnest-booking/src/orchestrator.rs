use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tripnest_core::payment::{GatewayError, PaymentGateway, PaymentIntent, PaymentOutcome};
use tripnest_core::BookingError;
use uuid::Uuid;

use crate::pricing::to_minor_units;

/// Adapter between the lifecycle manager and the external gateway.
pub struct PaymentOrchestrator {
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl PaymentOrchestrator {
    pub fn new(gateway: Arc<dyn PaymentGateway>, currency: impl Into<String>) -> Self {
        Self {
            gateway,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Initialize a payment intent for a reservation total
    pub async fn initialize_payment(&self, total_price: f64) -> Result<PaymentIntent, BookingError> {
        let amount = to_minor_units(total_price).ok_or_else(|| {
            BookingError::Validation(format!("total price {} is not a valid amount", total_price))
        })?;
        let intent = self
            .gateway
            .create_payment_intent(amount, &self.currency)
            .await?;

        if intent.reference.trim().is_empty() || intent.client_secret.trim().is_empty() {
            return Err(GatewayError::Malformed("payment intent without reference".into()).into());
        }

        info!("Created payment intent {} for {} {}", intent.reference, amount, self.currency);
        Ok(intent)
    }

    /// Single confirmation round trip. Callers decide whether to retry.
    pub async fn confirm_payment(
        &self,
        intent: &PaymentIntent,
        payment_method: &str,
    ) -> Result<(), BookingError> {
        match self
            .gateway
            .confirm_payment(&intent.client_secret, payment_method)
            .await?
        {
            PaymentOutcome::Succeeded => {
                info!("Payment {} succeeded", intent.reference);
                Ok(())
            }
            PaymentOutcome::Declined { reason } => {
                warn!("Payment {} declined: {}", intent.reference, reason);
                Err(BookingError::PaymentDeclined(reason))
            }
        }
    }
}

/// In-process gateway for tests and local runs.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    decline_reason: Option<String>,
    fail_intents: bool,
    intents: AtomicUsize,
    confirmations: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every confirmation comes back declined with `reason`.
    pub fn declining(reason: impl Into<String>) -> Self {
        Self {
            decline_reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Intent creation fails as if the provider returned a 503.
    pub fn failing() -> Self {
        Self {
            fail_intents: true,
            ..Self::default()
        }
    }

    pub fn intents_created(&self) -> usize {
        self.intents.load(Ordering::SeqCst)
    }

    pub fn confirmations(&self) -> usize {
        self.confirmations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        if self.fail_intents {
            return Err(GatewayError::Status {
                status: 503,
                message: "Simulated payment gateway failure".into(),
            });
        }
        self.intents.fetch_add(1, Ordering::SeqCst);

        let id = Uuid::new_v4().simple();
        Ok(PaymentIntent {
            reference: format!("mock_pi_{}", id),
            client_secret: format!("mock_pi_{}_secret", id),
            amount: amount_minor_units,
            currency: currency.to_string(),
            created_at: chrono::Utc::now(),
        })
    }

    async fn confirm_payment(
        &self,
        _client_secret: &str,
        _payment_method: &str,
    ) -> Result<PaymentOutcome, GatewayError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(match &self.decline_reason {
            Some(reason) => PaymentOutcome::Declined {
                reason: reason.clone(),
            },
            None => PaymentOutcome::Succeeded,
        })
    }
}

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};
use tripnest_core::payment::{GatewayError, PaymentGateway, PaymentIntent, PaymentOutcome};
use tripnest_shared::pii::Masked;

use crate::app_config::GatewayConfig;

#[derive(Debug, Serialize)]
struct CreateIntentRequest<'a> {
    amount: i64,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: String,
    amount: i64,
    currency: String,
}

#[derive(Debug, Serialize)]
struct ConfirmRequest<'a> {
    client_secret: &'a str,
    payment_method: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Card-processing provider over HTTPS JSON.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    api_key: Masked<String>,
    timeout: Duration,
}

impl HttpPaymentGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let timeout = config.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }

    fn request_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Request(err.to_string())
        }
    }
}

/// Provider error bodies look like `{"error": {"message": ".."}}`; fall back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

async fn status_error(response: Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    GatewayError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let response = self
            .client
            .post(format!("{}/payment-intents", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&CreateIntentRequest {
                amount: amount_minor_units,
                currency,
            })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response
            .json::<IntentResponse>()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        info!("Gateway created intent {} ({} {})", body.id, body.amount, body.currency);

        Ok(PaymentIntent {
            reference: body.id,
            client_secret: body.client_secret,
            amount: body.amount,
            currency: body.currency,
            created_at: Utc::now(),
        })
    }

    async fn confirm_payment(
        &self,
        client_secret: &str,
        payment_method: &str,
    ) -> Result<PaymentOutcome, GatewayError> {
        let response = self
            .client
            .post(format!("{}/payment-intents/confirm", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&ConfirmRequest {
                client_secret,
                payment_method,
            })
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        match response.status() {
            StatusCode::PAYMENT_REQUIRED => {
                let body = response.text().await.unwrap_or_default();
                let reason = error_message(&body);
                warn!("Gateway declined payment: {}", reason);
                Ok(PaymentOutcome::Declined { reason })
            }
            status if status.is_success() => {
                let body = response
                    .json::<ConfirmResponse>()
                    .await
                    .map_err(|e| GatewayError::Malformed(e.to_string()))?;
                if body.status == "succeeded" {
                    Ok(PaymentOutcome::Succeeded)
                } else {
                    Ok(PaymentOutcome::Declined {
                        reason: body.message.unwrap_or(body.status),
                    })
                }
            }
            _ => Err(status_error(response).await),
        }
    }
}

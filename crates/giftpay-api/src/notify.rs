//! # FormSubmit Notifier
//!
//! Sends milestone emails through a FormSubmit-style relay: a plain
//! `application/x-www-form-urlencoded` POST that the relay turns into an email.

use async_trait::async_trait;
use giftpay_core::{format_nok, Notifier, Order, PaymentError, PaymentResult};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct FormSubmitNotifier {
    endpoint: String,
    client: Client,
}

impl FormSubmitNotifier {
    /// `endpoint` is the full relay URL, e.g. `https://formsubmit.co/<address>`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> PaymentResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            PaymentError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, fields: &[(&'static str, String)]) -> PaymentResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(fields)
            .send()
            .await
            .map_err(|e| PaymentError::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Notification(format!(
                "relay returned HTTP {}: {}",
                status, body
            )));
        }

        debug!("Notification delivered: status={}", status);
        Ok(())
    }
}

/// Fields for the "new order" email
pub fn initiated_fields(order: &Order) -> Vec<(&'static str, String)> {
    vec![
        ("_subject", format!("New Order - {}", order.order_id)),
        ("_captcha", "false".to_string()),
        ("_template", "table".to_string()),
        ("order_id", order.order_id.clone()),
        ("amount", format_nok(order.amount)),
        ("certificate_type", order.certificate_type.clone()),
        ("buyer_name", order.buyer_name.clone()),
        ("buyer_email", order.buyer_email.clone()),
        ("recipient_name", order.recipient_name.clone()),
        (
            "message",
            order
                .message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
        ),
        ("status", "Payment Initiated".to_string()),
    ]
}

/// Fields for the "payment successful" email
pub fn captured_fields(order_id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("_subject", format!("Payment Successful - {}", order_id)),
        ("_captcha", "false".to_string()),
        ("order_id", order_id.to_string()),
        ("status", "PAID - Please send gift certificate".to_string()),
    ]
}

#[async_trait]
impl Notifier for FormSubmitNotifier {
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn order_initiated(&self, order: &Order) -> PaymentResult<()> {
        self.send(&initiated_fields(order)).await
    }

    #[instrument(skip(self))]
    async fn payment_captured(&self, order_id: &str) -> PaymentResult<()> {
        self.send(&captured_fields(order_id)).await
    }
}

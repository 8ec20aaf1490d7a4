//! # Payment Provider Trait
//!
//! Seam between the payment flow and the hosted-checkout provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentProvider (trait)                    │
//! │  ├── initiate_payment()                                     │
//! │  ├── payment_details()                                      │
//! │  ├── capture_payment()                                      │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                 ┌──────────┴──────────┐
//!         ┌───────┴───────┐     ┌───────┴───────┐
//!         │ VippsEcomm    │     │ test fakes    │
//!         │ Provider      │     │               │
//!         └───────────────┘     └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::InitiatePaymentRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Hosted checkout opened for an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub order_id: String,
    /// URL the buyer is redirected to
    pub redirect_url: String,
}

/// Provider-neutral state of a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Session created, buyer has not approved yet
    Initiated,
    /// Funds held, ready to capture
    Reserved,
    /// Funds transferred
    Captured,
    Cancelled,
    Refunded,
    Failed,
    /// Anything the provider reports that we do not model
    Unknown(String),
}

impl PaymentState {
    pub fn is_reserved(&self) -> bool {
        matches!(self, PaymentState::Reserved)
    }
}

/// Payment details as reported by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub order_id: String,
    pub state: PaymentState,
    /// Reserved amount still available to capture (minor units)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_amount: Option<i64>,
    /// Amount already captured (minor units)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_amount: Option<i64>,
    /// Unmodified provider payload
    pub raw: serde_json::Value,
}

/// Result of a successful capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReceipt {
    pub order_id: String,
    pub captured_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

/// Hosted-checkout payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a checkout session for `order_id` and return the redirect URL.
    ///
    /// `amount` is already validated, in minor units.
    async fn initiate_payment(
        &self,
        order_id: &str,
        amount: i64,
        request: &InitiatePaymentRequest,
    ) -> PaymentResult<PaymentSession>;

    /// Fetch the current payment details for `order_id`.
    async fn payment_details(&self, order_id: &str) -> PaymentResult<PaymentDetails>;

    /// Capture `amount` minor units of a reserved payment.
    async fn capture_payment(&self, order_id: &str, amount: i64) -> PaymentResult<CaptureReceipt>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared provider (dynamic dispatch)
pub type BoxedPaymentProvider = Arc<dyn PaymentProvider>;

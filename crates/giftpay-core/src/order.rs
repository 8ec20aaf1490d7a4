//! # Order Types
//!
//! Gift-certificate orders and the purchase request that creates them.

use crate::error::{PaymentError, PaymentResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Purchase request submitted by the gift-certificate form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    /// Amount in minor units (øre). Optional so a missing amount is a
    /// validation error rather than a body rejection.
    #[serde(default)]
    pub amount: Option<i64>,

    /// Certificate type shown in the Vipps app (e.g. "Evening Makeup")
    #[serde(default)]
    pub certificate_type: String,

    #[serde(default)]
    pub buyer_name: String,

    #[serde(default)]
    pub buyer_email: String,

    #[serde(default)]
    pub recipient_name: String,

    /// Optional greeting for the recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InitiatePaymentRequest {
    pub fn new(
        amount: i64,
        certificate_type: impl Into<String>,
        buyer_name: impl Into<String>,
        buyer_email: impl Into<String>,
        recipient_name: impl Into<String>,
    ) -> Self {
        Self {
            amount: Some(amount),
            certificate_type: certificate_type.into(),
            buyer_name: buyer_name.into(),
            buyer_email: buyer_email.into(),
            recipient_name: recipient_name.into(),
            message: None,
        }
    }

    /// Builder: set the greeting
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Check the amount against `min_amount` and return it
    pub fn validated_amount(&self, min_amount: i64) -> PaymentResult<i64> {
        match self.amount {
            Some(amount) if amount >= min_amount => Ok(amount),
            _ => Err(PaymentError::Validation(format!(
                "Amount must be at least {} øre ({})",
                min_amount,
                format_nok(min_amount)
            ))),
        }
    }

    /// Text shown to the buyer in the Vipps app
    pub fn transaction_text(&self) -> String {
        format!("{} - Gift Certificate", self.certificate_type)
    }
}

/// Lifecycle of an order. The only transition is `Initiated -> Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Checkout session opened, not yet captured
    #[default]
    Initiated,
    /// Payment captured
    Paid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Initiated => "initiated",
            OrderStatus::Paid => "paid",
        }
    }
}

/// A gift-certificate order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,

    /// Amount in minor units
    pub amount: i64,

    pub certificate_type: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub recipient_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub status: OrderStatus,

    pub created_at: DateTime<Utc>,

    /// Set when the order transitions to `Paid`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create an order in `Initiated` state from a validated request
    pub fn initiated(
        order_id: impl Into<String>,
        amount: i64,
        request: &InitiatePaymentRequest,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            amount,
            certificate_type: request.certificate_type.clone(),
            buyer_name: request.buyer_name.clone(),
            buyer_email: request.buyer_email.clone(),
            recipient_name: request.recipient_name.clone(),
            message: request.message.clone(),
            status: OrderStatus::Initiated,
            created_at: Utc::now(),
            paid_at: None,
        }
    }

    /// Move to `status`. Returns false if the order was already there.
    pub fn transition(&mut self, status: OrderStatus) -> bool {
        if self.status == status {
            return false;
        }
        if status == OrderStatus::Paid {
            self.paid_at = Some(Utc::now());
        }
        self.status = status;
        true
    }

    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }
}

/// Format minor units as kroner, e.g. `1500` -> `"15.00 NOK"`
pub fn format_nok(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{}.{:02} NOK", sign, abs / 100, abs % 100)
}

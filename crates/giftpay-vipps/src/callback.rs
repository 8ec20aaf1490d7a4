//! # Vipps Callbacks
//!
//! Payload parsing and authorization for Vipps payment callbacks.
//!
//! Vipps posts `{merchantSerialNumber, orderId, transactionInfo{...}}` to
//! `{callbackPrefix}/v2/payments/{orderId}`. The flat `{orderId, transactionId}`
//! shape is accepted as well.

use crate::ecomm::state_from_vipps;
use giftpay_core::{PaymentError, PaymentResult, PaymentState};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Transaction block of a Vipps callback
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackTransactionInfo {
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub time_stamp: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Callback body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(default)]
    pub merchant_serial_number: Option<String>,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub transaction_info: Option<CallbackTransactionInfo>,
}

impl CallbackPayload {
    /// Transaction id from either payload shape
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref().or_else(|| {
            self.transaction_info
                .as_ref()
                .and_then(|info| info.transaction_id.as_deref())
        })
    }

    /// State Vipps claims in the callback. Informational only; the
    /// authoritative state comes from the details endpoint.
    pub fn reported_state(&self) -> Option<PaymentState> {
        self.transaction_info
            .as_ref()
            .and_then(|info| info.status.as_deref())
            .map(state_from_vipps)
    }
}

/// Issues and verifies per-order callback tokens.
///
/// The token is `hex(HMAC-SHA256(secret, orderId))`, sent to Vipps as
/// `merchantInfo.authToken` and expected back in the `Authorization` header.
#[derive(Clone)]
pub struct CallbackAuthenticator {
    secret: String,
}

impl CallbackAuthenticator {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Token for `order_id`
    pub fn token_for(&self, order_id: &str) -> String {
        compute_hmac_sha256(&self.secret, order_id)
    }

    /// Check the `Authorization` header of a callback for `order_id`
    pub fn verify(&self, order_id: &str, authorization: Option<&str>) -> PaymentResult<()> {
        let presented = authorization
            .map(|h| h.trim())
            .map(|h| h.strip_prefix("Bearer ").unwrap_or(h))
            .ok_or_else(|| {
                PaymentError::CallbackUnauthorized("missing Authorization header".to_string())
            })?;

        if constant_time_compare(presented, &self.token_for(order_id)) {
            Ok(())
        } else {
            Err(PaymentError::CallbackUnauthorized(
                "token mismatch".to_string(),
            ))
        }
    }
}

fn compute_hmac_sha256(secret: &str, message: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() || b.is_empty() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

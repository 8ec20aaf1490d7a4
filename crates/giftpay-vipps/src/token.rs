//! # Access Token Cache
//!
//! Holds the Vipps bearer token and its expiry. The lock is only held to read
//! or write the slot, never across the refresh request, so concurrent callers
//! may both refresh. Each gets a valid token; the last write wins.

use chrono::{DateTime, Duration, Utc};
use giftpay_core::{PaymentError, PaymentResult};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Seconds shaved off `expires_in` so a token is never used at the edge of its life
pub const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Token that expires `expires_in_secs` (minus the safety margin) after `now`.
    ///
    /// Lifetimes that do not fit a timestamp are a `Serialization` error.
    pub fn issued_at(
        value: impl Into<String>,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> PaymentResult<Self> {
        let expires_at = expires_in_secs
            .checked_sub(EXPIRY_SAFETY_MARGIN_SECS)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                PaymentError::Serialization(format!(
                    "Vipps token lifetime out of range: expires_in={}",
                    expires_in_secs
                ))
            })?;

        Ok(Self {
            value: value.into(),
            expires_at,
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Shared slot for the current access token
#[derive(Debug, Default, Clone)]
pub struct TokenCache {
    slot: Arc<RwLock<Option<AccessToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached token value if it is still valid at `now`
    pub async fn get_valid(&self, now: DateTime<Utc>) -> Option<String> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|token| token.is_valid_at(now))
            .map(|token| token.value.clone())
    }

    /// Replace the cached token
    pub async fn store(&self, token: AccessToken) {
        let mut slot = self.slot.write().await;
        *slot = Some(token);
    }

    pub async fn clear(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }

    /// Current expiry, if a token is cached
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.slot.read().await.as_ref().map(|t| t.expires_at)
    }
}

/// Body of `POST /accesstoken/get`
#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenResponse {
    pub access_token: String,
    /// Vipps sends this as a string; accept numbers too
    #[serde(deserialize_with = "number_or_string")]
    pub expires_in: i64,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

//! # Order IDs
//!
//! Short, shareable order ids: merchant tag + base36 timestamp + base36 random
//! suffix, uppercased (e.g. `OBM3X9K2Q1A7F2Z`).
//!
//! Uniqueness is probabilistic. Two ids minted in the same millisecond collide
//! with probability 1 / 36^5 (about 1 in 60 million); nothing checks for it.

use crate::error::{PaymentError, PaymentResult};
use chrono::Utc;
use uuid::Uuid;

/// Default merchant tag
pub const DEFAULT_PREFIX: &str = "OB";

const RANDOM_LEN: u32 = 5;
const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates order ids with a fixed merchant prefix
#[derive(Debug, Clone)]
pub struct OrderIdGenerator {
    prefix: String,
}

impl OrderIdGenerator {
    /// Generator for `prefix`, uppercased.
    ///
    /// The prefix must be non-empty ASCII alphanumerics so every id stays
    /// within the `[0-9A-Z]` alphabet Vipps accepts.
    pub fn new(prefix: impl Into<String>) -> PaymentResult<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(PaymentError::Configuration(format!(
                "Order id prefix must be ASCII letters or digits, got {:?}",
                prefix
            )));
        }

        Ok(Self {
            prefix: prefix.to_ascii_uppercase(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Mint a new id
    pub fn generate(&self) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u128;
        // v4 uuids carry 122 random bits; five base36 digits need ~26
        let random = Uuid::new_v4().as_u128() % 36u128.pow(RANDOM_LEN);

        format!(
            "{}{}{}",
            self.prefix,
            to_base36(millis, 1),
            to_base36(random, RANDOM_LEN as usize)
        )
    }

    /// Check that `id` has the shape this generator produces
    pub fn is_well_formed(&self, id: &str) -> bool {
        id.strip_prefix(self.prefix.as_str())
            .map(|rest| {
                rest.len() > RANDOM_LEN as usize
                    && rest.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
            })
            .unwrap_or(false)
    }
}

impl Default for OrderIdGenerator {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

/// Uppercase base36, left-padded with zeros to `min_width`
fn to_base36(mut value: u128, min_width: usize) -> String {
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    while digits.len() < min_width {
        digits.push(b'0');
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

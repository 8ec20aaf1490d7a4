//! # giftpay-vipps
//!
//! Vipps eCom v2 payment provider for giftpay.
//!
//! The provider talks to four Vipps endpoints:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | access token | `POST /accesstoken/get` |
//! | initiate | `POST /ecomm/v2/payments` |
//! | details | `GET /ecomm/v2/payments/{orderId}/details` |
//! | capture | `POST /ecomm/v2/payments/{orderId}/capture` |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use giftpay_vipps::VippsEcommProvider;
//! use giftpay_core::PaymentProvider;
//!
//! let provider = VippsEcommProvider::from_env()?;
//!
//! let session = provider.initiate_payment(&order_id, 1500, &request).await?;
//!
//! // Redirect the buyer to session.redirect_url
//! ```
//!
//! ## Callbacks
//!
//! Vipps posts to `{callbackPrefix}/v2/payments/{orderId}`. When a callback
//! secret is configured, every payment carries an `authToken` that Vipps
//! echoes back in the `Authorization` header:
//!
//! ```rust,ignore
//! use giftpay_vipps::CallbackPayload;
//!
//! if let Some(auth) = config.callback_authenticator() {
//!     auth.verify(&payload.order_id, authorization_header)?;
//! }
//! ```

pub mod callback;
pub mod config;
pub mod ecomm;
pub mod token;

// Re-exports
pub use callback::{CallbackAuthenticator, CallbackPayload, CallbackTransactionInfo};
pub use config::{VippsConfig, VippsEnvironment};
pub use ecomm::{state_from_vipps, VippsEcommProvider};
pub use token::{AccessToken, TokenCache, EXPIRY_SAFETY_MARGIN_SECS};

/// Provider name used in logs and errors
pub const PROVIDER_NAME: &str = "vipps";

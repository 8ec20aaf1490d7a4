//! # Vipps Configuration
//!
//! Configuration management for the Vipps integration.
//! All secrets are loaded from environment variables.

use crate::callback::CallbackAuthenticator;
use giftpay_core::PaymentError;
use std::env;
use std::fmt;
use std::time::Duration;

pub const TEST_BASE_URL: &str = "https://apitest.vipps.no";
pub const PRODUCTION_BASE_URL: &str = "https://api.vipps.no";

/// Default outbound request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Vipps environment (selects the API base URL)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VippsEnvironment {
    Test,
    Production,
}

impl VippsEnvironment {
    /// `"production"` selects production, anything else is test
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            VippsEnvironment::Production
        } else {
            VippsEnvironment::Test
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            VippsEnvironment::Test => TEST_BASE_URL,
            VippsEnvironment::Production => PRODUCTION_BASE_URL,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VippsEnvironment::Test => "test",
            VippsEnvironment::Production => "production",
        }
    }
}

/// Vipps API configuration
#[derive(Clone)]
pub struct VippsConfig {
    /// Merchant serial number (MSN)
    pub merchant_serial_number: String,

    pub client_id: String,

    pub client_secret: String,

    /// `Ocp-Apim-Subscription-Key`
    pub subscription_key: String,

    pub environment: VippsEnvironment,

    /// API base URL (derived from the environment, overridable for mocks)
    pub api_base_url: String,

    /// Public URL of this backend, used for callback and fallback URLs
    pub app_url: String,

    /// Secret for per-order callback tokens. `None` accepts callbacks unauthenticated.
    pub callback_secret: Option<String>,

    /// Outbound request timeout
    pub timeout: Duration,

    /// `Vipps-System-*` identification headers
    pub system_name: String,
    pub system_version: String,
    pub plugin_name: String,
    pub plugin_version: String,
}

impl VippsConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `VIPPS_MSN`
    /// - `VIPPS_CLIENT_ID`
    /// - `VIPPS_CLIENT_SECRET`
    /// - `VIPPS_SUBSCRIPTION_KEY`
    ///
    /// Optional: `VIPPS_ENV`, `VIPPS_API_BASE_URL`, `VIPPS_CALLBACK_SECRET`,
    /// `VIPPS_HTTP_TIMEOUT_SECS`, `APP_URL`.
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PaymentError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PaymentError::Configuration(format!("{} not set", key)))
        };

        let mut config = Self::new(
            required("VIPPS_MSN")?,
            required("VIPPS_CLIENT_ID")?,
            required("VIPPS_CLIENT_SECRET")?,
            required("VIPPS_SUBSCRIPTION_KEY")?,
        );

        if let Some(environment) = lookup("VIPPS_ENV") {
            config = config.with_environment(VippsEnvironment::parse(&environment));
        }

        if let Some(url) = lookup("VIPPS_API_BASE_URL").filter(|v| !v.is_empty()) {
            config = config.with_api_base_url(url);
        }

        if let Some(app_url) = lookup("APP_URL").filter(|v| !v.is_empty()) {
            config = config.with_app_url(app_url);
        }

        if let Some(secret) = lookup("VIPPS_CALLBACK_SECRET").filter(|v| !v.is_empty()) {
            config = config.with_callback_secret(secret);
        }

        if let Some(raw) = lookup("VIPPS_HTTP_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                PaymentError::Configuration(format!(
                    "VIPPS_HTTP_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                    raw
                ))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Create config with explicit values (test environment)
    pub fn new(
        merchant_serial_number: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        subscription_key: impl Into<String>,
    ) -> Self {
        Self {
            merchant_serial_number: merchant_serial_number.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            subscription_key: subscription_key.into(),
            environment: VippsEnvironment::Test,
            api_base_url: TEST_BASE_URL.to_string(),
            app_url: "http://localhost:3000".to_string(),
            callback_secret: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            system_name: "OlgaBerge".to_string(),
            system_version: "1.0".to_string(),
            plugin_name: "custom-integration".to_string(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Builder: select environment (also resets the base URL)
    pub fn with_environment(mut self, environment: VippsEnvironment) -> Self {
        self.environment = environment;
        self.api_base_url = environment.base_url().to_string();
        self
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: set the public app URL
    pub fn with_app_url(mut self, url: impl Into<String>) -> Self {
        self.app_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: enable callback authorization
    pub fn with_callback_secret(mut self, secret: impl Into<String>) -> Self {
        self.callback_secret = Some(secret.into());
        self
    }

    /// Builder: set outbound timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == VippsEnvironment::Production
    }

    /// Prefix Vipps appends `/v2/payments/{orderId}` to
    pub fn callback_prefix(&self) -> String {
        format!("{}/api/vipps/callback", self.app_url)
    }

    /// Where the buyer lands after leaving the Vipps checkout
    pub fn fallback_url(&self, order_id: &str) -> String {
        format!("{}/payment-success?orderId={}", self.app_url, order_id)
    }

    /// Callback token issuer/verifier, if a secret is configured
    pub fn callback_authenticator(&self) -> Option<CallbackAuthenticator> {
        self.callback_secret
            .as_deref()
            .map(CallbackAuthenticator::new)
    }
}

impl fmt::Debug for VippsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VippsConfig")
            .field("merchant_serial_number", &self.merchant_serial_number)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_key", &"<redacted>")
            .field("environment", &self.environment)
            .field("api_base_url", &self.api_base_url)
            .field("app_url", &self.app_url)
            .field("callback_secret", &self.callback_secret.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

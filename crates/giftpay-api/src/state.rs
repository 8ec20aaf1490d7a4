//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the payment service, callback authenticator and configuration.

use crate::notify::FormSubmitNotifier;
use giftpay_core::{
    BoxedNotifier, InMemoryOrderRepository, LoggingNotifier, OrderIdGenerator, PaymentResult,
    PaymentService, DEFAULT_MIN_AMOUNT,
};
use giftpay_vipps::{CallbackAuthenticator, VippsConfig, VippsEcommProvider};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public URL of this backend
    pub app_url: String,
    /// Vipps environment name ("test" or "production")
    pub environment: String,
    /// FormSubmit relay URL; `None` logs notifications instead
    pub notify_endpoint: Option<String>,
    /// Minimum accepted amount in minor units
    pub min_amount: i64,
    /// Merchant tag for order ids
    pub order_id_prefix: String,
    /// Timeout for the notification relay
    pub notify_timeout: Duration,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            app_url: lookup("APP_URL")
                .filter(|v| !v.is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.app_url),
            environment: lookup("VIPPS_ENV").unwrap_or(defaults.environment),
            notify_endpoint: lookup("NOTIFY_ENDPOINT").filter(|v| !v.trim().is_empty()),
            min_amount: lookup("MIN_AMOUNT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_amount),
            order_id_prefix: lookup("ORDER_ID_PREFIX")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.order_id_prefix),
            notify_timeout: lookup("VIPPS_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.notify_timeout),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid socket address {}: {}", addr, e))
    }

    /// Order id generator for the configured merchant tag
    pub fn order_id_generator(&self) -> PaymentResult<OrderIdGenerator> {
        OrderIdGenerator::new(&self.order_id_prefix)
    }

    /// Check if running against Vipps production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            app_url: "http://localhost:3000".to_string(),
            environment: "test".to_string(),
            notify_endpoint: None,
            min_amount: DEFAULT_MIN_AMOUNT,
            order_id_prefix: "OB".to_string(),
            notify_timeout: Duration::from_secs(30),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment flow
    pub service: PaymentService,
    /// Verifies callback tokens when a callback secret is configured
    pub callback_auth: Option<CallbackAuthenticator>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Create a new AppState backed by Vipps and the in-memory order store
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let order_ids = config
            .order_id_generator()
            .map_err(|e| anyhow::anyhow!("Invalid ORDER_ID_PREFIX: {}", e))?;

        let vipps_config = VippsConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load Vipps config: {}", e))?
            .with_app_url(&config.app_url);
        let callback_auth = vipps_config.callback_authenticator();
        if callback_auth.is_none() {
            tracing::warn!("VIPPS_CALLBACK_SECRET not set, callbacks are not authenticated");
        }

        let provider = VippsEcommProvider::new(vipps_config)
            .map_err(|e| anyhow::anyhow!("Failed to initialize Vipps: {}", e))?;

        let notifier: BoxedNotifier = match &config.notify_endpoint {
            Some(endpoint) => Arc::new(
                FormSubmitNotifier::new(endpoint, config.notify_timeout)
                    .map_err(|e| anyhow::anyhow!("Failed to initialize notifier: {}", e))?,
            ),
            None => {
                tracing::warn!("NOTIFY_ENDPOINT not set, notifications are only logged");
                Arc::new(LoggingNotifier)
            }
        };

        let service = PaymentService::new(
            Arc::new(provider),
            Arc::new(InMemoryOrderRepository::new()),
            notifier,
        )
        .with_min_amount(config.min_amount)
        .with_order_ids(order_ids);

        Ok(Self {
            service,
            callback_auth,
            config,
        })
    }

    /// State around an already-built service (tests, alternative providers)
    pub fn with_service(service: PaymentService, config: AppConfig) -> Self {
        Self {
            service,
            callback_auth: None,
            config,
        }
    }

    /// Builder: require callback tokens
    pub fn with_callback_auth(mut self, auth: CallbackAuthenticator) -> Self {
        self.callback_auth = Some(auth);
        self
    }
}

//! # Vipps eCom v2 Payments
//!
//! Implementation of the Vipps eCom v2 API: access tokens, payment
//! initiation, payment details and capture.

use crate::config::VippsConfig;
use crate::token::{AccessToken, AccessTokenResponse, TokenCache};
use crate::PROVIDER_NAME;
use async_trait::async_trait;
use chrono::Utc;
use giftpay_core::{
    CaptureReceipt, InitiatePaymentRequest, PaymentDetails, PaymentError, PaymentProvider,
    PaymentResult, PaymentSession, PaymentState,
};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const CAPTURE_TEXT: &str = "Gift Certificate Payment";

/// Vipps eCom provider
///
/// Buyers are redirected to the Vipps hosted landing page; funds are reserved
/// on approval and captured from the callback.
pub struct VippsEcommProvider {
    config: VippsConfig,
    client: Client,
    tokens: TokenCache,
}

impl VippsEcommProvider {
    /// Create a new Vipps provider
    pub fn new(config: VippsConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                PaymentError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            client,
            tokens: TokenCache::new(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        let config = VippsConfig::from_env()?;
        Self::new(config)
    }

    pub fn config(&self) -> &VippsConfig {
        &self.config
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.tokens
    }

    /// Bearer token, from cache or freshly fetched
    pub async fn access_token(&self) -> PaymentResult<String> {
        if let Some(token) = self.tokens.get_valid(Utc::now()).await {
            return Ok(token);
        }

        debug!("Refreshing Vipps access token");

        let url = format!("{}/accesstoken/get", self.config.api_base_url);
        let response = self
            .client
            .post(&url)
            .header("client_id", &self.config.client_id)
            .header("client_secret", &self.config.client_secret)
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body = response.text().await.map_err(network_error)?;

        if !status.is_success() {
            error!("Failed to get Vipps access token: status={}, body={}", status, body);
            return Err(PaymentError::Auth {
                provider: "Vipps".to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let parsed: AccessTokenResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Vipps token response: {}", e))
        })?;

        let token = AccessToken::issued_at(parsed.access_token, parsed.expires_in, Utc::now())?;
        debug!("Vipps access token valid until {}", token.expires_at);

        let value = token.value.clone();
        self.tokens.store(token).await;
        Ok(value)
    }

    /// Attach the headers every eCom call carries
    fn authorized(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .bearer_auth(token)
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .header("Merchant-Serial-Number", &self.config.merchant_serial_number)
            .header("Vipps-System-Name", &self.config.system_name)
            .header("Vipps-System-Version", &self.config.system_version)
            .header("Vipps-System-Plugin-Name", &self.config.plugin_name)
            .header("Vipps-System-Plugin-Version", &self.config.plugin_version)
    }

    /// `{base}/ecomm/v2/payments/{order_id}/{action}` with the order id
    /// encoded as a single path segment
    fn payment_url(&self, order_id: &str, action: &str) -> PaymentResult<Url> {
        let mut url = Url::parse(&self.config.api_base_url).map_err(|e| {
            PaymentError::Configuration(format!("Invalid Vipps API base URL: {}", e))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                PaymentError::Configuration(format!(
                    "Vipps API base URL cannot carry a path: {}",
                    self.config.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend(["ecomm", "v2", "payments", order_id, action]);

        Ok(url)
    }

    fn build_initiate_body(
        &self,
        order_id: &str,
        amount: i64,
        request: &InitiatePaymentRequest,
    ) -> InitiatePaymentBody {
        InitiatePaymentBody {
            merchant_info: MerchantInfo {
                merchant_serial_number: self.config.merchant_serial_number.clone(),
                callback_prefix: self.config.callback_prefix(),
                fall_back: self.config.fallback_url(order_id),
                is_app: false,
                auth_token: self
                    .config
                    .callback_authenticator()
                    .map(|auth| auth.token_for(order_id)),
            },
            customer_info: CustomerInfo {
                mobile_number: None,
            },
            transaction: Transaction {
                order_id: order_id.to_string(),
                amount,
                transaction_text: request.transaction_text(),
            },
        }
    }
}

#[async_trait]
impl PaymentProvider for VippsEcommProvider {
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    async fn initiate_payment(
        &self,
        order_id: &str,
        amount: i64,
        request: &InitiatePaymentRequest,
    ) -> PaymentResult<PaymentSession> {
        let token = self.access_token().await?;
        let body = self.build_initiate_body(order_id, amount, request);

        debug!(
            "Initiating Vipps payment: amount={}, callback_prefix={}",
            amount, body.merchant_info.callback_prefix
        );

        let url = format!("{}/ecomm/v2/payments", self.config.api_base_url);
        let response = self
            .authorized(self.client.post(&url), &token)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let (parsed, _raw): (InitiateResponse, _) = read_json(response, "initiate").await?;

        info!("Created Vipps payment: order={}", parsed.order_id);

        Ok(PaymentSession {
            order_id: order_id.to_string(),
            redirect_url: parsed.url,
        })
    }

    #[instrument(skip(self))]
    async fn payment_details(&self, order_id: &str) -> PaymentResult<PaymentDetails> {
        let token = self.access_token().await?;

        let response = self
            .authorized(self.client.get(self.payment_url(order_id, "details")?), &token)
            .send()
            .await
            .map_err(network_error)?;

        let (parsed, raw): (DetailsResponse, _) = read_json(response, "details").await?;

        let state = parsed.state();
        debug!("Vipps payment {} is {:?}", order_id, state);

        let summary = parsed.transaction_summary.as_ref();
        Ok(PaymentDetails {
            order_id: order_id.to_string(),
            state,
            reserved_amount: summary.and_then(|s| s.remaining_amount_to_capture),
            captured_amount: summary.and_then(|s| s.captured_amount),
            raw,
        })
    }

    #[instrument(skip(self))]
    async fn capture_payment(&self, order_id: &str, amount: i64) -> PaymentResult<CaptureReceipt> {
        let token = self.access_token().await?;

        let body = CaptureBody {
            merchant_info: CaptureMerchantInfo {
                merchant_serial_number: self.config.merchant_serial_number.clone(),
            },
            transaction: CaptureTransaction {
                amount,
                transaction_text: CAPTURE_TEXT.to_string(),
            },
        };

        let response = self
            .authorized(self.client.post(self.payment_url(order_id, "capture")?), &token)
            .header("X-Request-Id", Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let (parsed, _raw): (CaptureResponse, _) = read_json(response, "capture").await?;

        let info = parsed.transaction_info.unwrap_or_default();
        Ok(CaptureReceipt {
            order_id: order_id.to_string(),
            captured_amount: info.amount.unwrap_or(amount),
            transaction_id: info.transaction_id,
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Map a Vipps status or operation name to a `PaymentState`
pub fn state_from_vipps(value: &str) -> PaymentState {
    match value.trim().to_ascii_uppercase().as_str() {
        "INITIATE" | "INITIATED" => PaymentState::Initiated,
        "RESERVE" | "RESERVED" => PaymentState::Reserved,
        "CAPTURE" | "CAPTURED" | "SALE" => PaymentState::Captured,
        "CANCEL" | "CANCELLED" | "VOID" => PaymentState::Cancelled,
        "REFUND" | "REFUNDED" => PaymentState::Refunded,
        "FAILED" | "REJECTED" | "RESERVE_FAILED" | "SALE_FAILED" => PaymentState::Failed,
        other => PaymentState::Unknown(other.to_string()),
    }
}

fn network_error(e: reqwest::Error) -> PaymentError {
    if e.is_timeout() {
        PaymentError::Network(format!("request to Vipps timed out: {}", e))
    } else {
        PaymentError::Network(e.to_string())
    }
}

/// Check the status and decode the body, keeping the raw JSON alongside
async fn read_json<T: DeserializeOwned>(
    response: Response,
    operation: &str,
) -> PaymentResult<(T, serde_json::Value)> {
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;

    if !status.is_success() {
        error!("Vipps {} error: status={}, body={}", operation, status, body);

        let details = serde_json::from_str::<serde_json::Value>(&body)
            .unwrap_or_else(|_| serde_json::Value::String(body.clone()));
        return Err(PaymentError::Provider {
            provider: PROVIDER_NAME.to_string(),
            message: format!("{} failed with HTTP {}", operation, status),
            details: Some(details),
        });
    }

    let raw: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
        PaymentError::Serialization(format!("Failed to parse Vipps {} response: {}", operation, e))
    })?;
    let parsed = serde_json::from_value(raw.clone()).map_err(|e| {
        PaymentError::Serialization(format!("Unexpected Vipps {} response: {}", operation, e))
    })?;

    Ok((parsed, raw))
}

// =============================================================================
// Vipps API Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitiatePaymentBody {
    merchant_info: MerchantInfo,
    customer_info: CustomerInfo,
    transaction: Transaction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MerchantInfo {
    merchant_serial_number: String,
    callback_prefix: String,
    fall_back: String,
    is_app: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerInfo {
    /// Left empty; Vipps asks the buyer for it
    #[serde(skip_serializing_if = "Option::is_none")]
    mobile_number: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Transaction {
    order_id: String,
    amount: i64,
    transaction_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateResponse {
    #[serde(default)]
    order_id: String,
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureBody {
    merchant_info: CaptureMerchantInfo,
    transaction: CaptureTransaction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureMerchantInfo {
    merchant_serial_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptureTransaction {
    amount: i64,
    transaction_text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptureResponse {
    #[serde(default)]
    transaction_info: Option<TransactionInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionInfo {
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    transaction_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailsResponse {
    #[serde(default)]
    transaction_summary: Option<TransactionSummary>,
    #[serde(default)]
    transaction_log_history: Vec<TransactionLogEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionSummary {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    captured_amount: Option<i64>,
    #[serde(default)]
    remaining_amount_to_capture: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionLogEntry {
    operation: String,
    #[serde(default = "default_true")]
    operation_success: bool,
}

fn default_true() -> bool {
    true
}

impl DetailsResponse {
    /// Explicit summary status if present, else the newest successful
    /// operation in the log (Vipps lists newest first).
    fn state(&self) -> PaymentState {
        if let Some(status) = self
            .transaction_summary
            .as_ref()
            .and_then(|s| s.status.as_deref())
        {
            return state_from_vipps(status);
        }

        self.transaction_log_history
            .iter()
            .find(|entry| entry.operation_success)
            .map(|entry| state_from_vipps(&entry.operation))
            .unwrap_or(PaymentState::Initiated)
    }
}

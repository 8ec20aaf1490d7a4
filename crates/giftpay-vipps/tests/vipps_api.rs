//! Contract tests for the Vipps eCom provider against a mock Vipps API.

use giftpay_core::{InitiatePaymentRequest, PaymentError, PaymentProvider, PaymentState};
use giftpay_vipps::{VippsConfig, VippsEcommProvider};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn config_for(server: &MockServer) -> VippsConfig {
    VippsConfig::new("123456", "client-id", "client-secret", "sub-key")
        .with_api_base_url(server.uri())
        .with_app_url("https://olgaberge.no")
}

fn provider_for(server: &MockServer) -> VippsEcommProvider {
    VippsEcommProvider::new(config_for(server)).unwrap()
}

async fn mount_token(server: &MockServer, expires_in: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/accesstoken/get"))
        .and(header("client_id", "client-id"))
        .and(header("client_secret", "client-secret"))
        .and(header("Ocp-Apim-Subscription-Key", "sub-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": expires_in,
            "ext_expires_in": expires_in,
            "access_token": "test-token"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn kari() -> InitiatePaymentRequest {
    InitiatePaymentRequest::new(1500, "Evening Makeup", "Kari", "kari@example.com", "Lise")
}

// ============================================================================
// Access token
// ============================================================================

#[tokio::test]
async fn test_token_is_cached_within_validity() {
    let server = MockServer::start().await;
    mount_token(&server, "3600", 1).await;

    let provider = provider_for(&server);
    assert_eq!(provider.access_token().await.unwrap(), "test-token");
    assert_eq!(provider.access_token().await.unwrap(), "test-token");
}

#[tokio::test]
async fn test_token_is_refreshed_after_expiry() {
    let server = MockServer::start().await;
    // 30s lifetime minus the 60s safety margin: stale as soon as it is stored
    mount_token(&server, "30", 2).await;

    let provider = provider_for(&server);
    provider.access_token().await.unwrap();
    provider.access_token().await.unwrap();
}

#[tokio::test]
async fn test_absurd_token_lifetime_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server, "9999999999999", 1).await;

    let provider = provider_for(&server);
    let err = provider.access_token().await.unwrap_err();

    assert!(matches!(err, PaymentError::Serialization(_)));
    assert!(provider.token_cache().expires_at().await.is_none());
}

#[tokio::test]
async fn test_rejected_credentials_are_auth_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accesstoken/get"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "unauthorized_client"
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let err = provider.access_token().await.unwrap_err();

    assert!(matches!(err, PaymentError::Auth { .. }));
    assert_eq!(err.public_message(), "Failed to authenticate with Vipps");
    assert!(provider.token_cache().expires_at().await.is_none());
}

// ============================================================================
// Initiate
// ============================================================================

#[tokio::test]
async fn test_initiate_payment() {
    let server = MockServer::start().await;
    mount_token(&server, "3600", 1).await;

    Mock::given(method("POST"))
        .and(path("/ecomm/v2/payments"))
        .and(header("Authorization", "Bearer test-token"))
        .and(header("Ocp-Apim-Subscription-Key", "sub-key"))
        .and(header("Merchant-Serial-Number", "123456"))
        .and(header("Vipps-System-Name", "OlgaBerge"))
        .and(header_exists("Vipps-System-Plugin-Version"))
        .and(body_partial_json(json!({
            "merchantInfo": {
                "merchantSerialNumber": "123456",
                "callbackPrefix": "https://olgaberge.no/api/vipps/callback",
                "fallBack": "https://olgaberge.no/payment-success?orderId=OBTEST1",
                "isApp": false
            },
            "transaction": {
                "orderId": "OBTEST1",
                "amount": 1500,
                "transactionText": "Evening Makeup - Gift Certificate"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "OBTEST1",
            "url": "https://apitest.vipps.no/dwo-api-application/v1/deeplink/vippsgateway?v=2&token=abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let session = provider
        .initiate_payment("OBTEST1", 1500, &kari())
        .await
        .unwrap();

    assert_eq!(session.order_id, "OBTEST1");
    assert!(session.redirect_url.starts_with("https://apitest.vipps.no/"));
}

#[tokio::test]
async fn test_initiate_error_keeps_upstream_details() {
    let server = MockServer::start().await;
    mount_token(&server, "3600", 1).await;

    Mock::given(method("POST"))
        .and(path("/ecomm/v2/payments"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!([{
            "errorGroup": "Payment",
            "errorMessage": "Duplicate order id",
            "errorCode": "35"
        }])))
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let err = provider
        .initiate_payment("OBTEST1", 1500, &kari())
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Provider { .. }));
    assert_eq!(err.details().unwrap()[0]["errorCode"], "35");
}

// ============================================================================
// Details and capture
// ============================================================================

#[tokio::test]
async fn test_details_and_capture() {
    let server = MockServer::start().await;
    mount_token(&server, "3600", 1).await;

    let details_body = json!({
        "orderId": "OBTEST1",
        "transactionSummary": {
            "capturedAmount": 0,
            "remainingAmountToCapture": 1500,
            "refundedAmount": 0,
            "remainingAmountToRefund": 0
        },
        "transactionLogHistory": [
            {"amount": 1500, "operation": "RESERVE", "operationSuccess": true,
             "transactionId": "5001420062", "timeStamp": "2026-10-18T12:01:00.000Z"},
            {"amount": 1500, "operation": "INITIATE", "operationSuccess": true,
             "transactionId": "5001420062", "timeStamp": "2026-10-18T12:00:00.000Z"}
        ]
    });

    Mock::given(method("GET"))
        .and(path("/ecomm/v2/payments/OBTEST1/details"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(details_body.clone()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ecomm/v2/payments/OBTEST1/capture"))
        .and(header_exists("X-Request-Id"))
        .and(body_partial_json(json!({
            "merchantInfo": {"merchantSerialNumber": "123456"},
            "transaction": {"amount": 1500, "transactionText": "Gift Certificate Payment"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orderId": "OBTEST1",
            "transactionInfo": {
                "amount": 1500,
                "status": "Captured",
                "transactionId": "5001420063",
                "timeStamp": "2026-10-18T12:02:00.000Z"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);

    let details = provider.payment_details("OBTEST1").await.unwrap();
    assert_eq!(details.state, PaymentState::Reserved);
    assert_eq!(details.reserved_amount, Some(1500));
    assert_eq!(details.raw, details_body);

    let receipt = provider.capture_payment("OBTEST1", 1500).await.unwrap();
    assert_eq!(receipt.captured_amount, 1500);
    assert_eq!(receipt.transaction_id.as_deref(), Some("5001420063"));
}

#[tokio::test]
async fn test_details_not_found_is_provider_error() {
    let server = MockServer::start().await;
    mount_token(&server, "3600", 1).await;

    Mock::given(method("GET"))
        .and(path("/ecomm/v2/payments/NOPE/details"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = provider_for(&server)
        .payment_details("NOPE")
        .await
        .unwrap_err();

    assert!(matches!(err, PaymentError::Provider { .. }));
    assert_eq!(err.details(), Some(&json!("not found")));
}

#[tokio::test]
async fn test_timeout_is_retryable_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accesstoken/get"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"expires_in": "3600", "access_token": "slow"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = config_for(&server).with_timeout(Duration::from_millis(100));
    let provider = VippsEcommProvider::new(config).unwrap();

    let err = provider.access_token().await.unwrap_err();
    assert!(matches!(err, PaymentError::Network(_)));
    assert!(err.is_retryable());
}

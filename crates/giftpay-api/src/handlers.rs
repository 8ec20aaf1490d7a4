//! # Request Handlers
//!
//! Axum request handlers for the Vipps payment API.

use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use giftpay_core::{CallbackOutcome, InitiatePaymentRequest, PaymentError};
use giftpay_vipps::CallbackPayload;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Initiate payment response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub success: bool,
    pub order_id: String,
    /// Vipps checkout URL (redirect the buyer here)
    pub vipps_url: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn payment_error_to_response(err: &PaymentError) -> ApiError {
    let code = err.status_code();
    let response = ErrorResponse::new(err.public_message(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

/// Initiation failures other than bad input are reported as one generic
/// error with whatever the provider said attached.
fn initiate_error_to_response(err: &PaymentError) -> ApiError {
    if let PaymentError::Validation(msg) = err {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(msg.clone(), 400)),
        );
    }

    let details = err
        .details()
        .cloned()
        .unwrap_or_else(|| serde_json::Value::String(err.public_message()));

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Failed to initiate payment", 500).with_details(details)),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Start a gift-certificate payment
#[instrument(skip(state, body))]
pub async fn initiate_payment(
    State(state): State<AppState>,
    body: Result<Json<InitiatePaymentRequest>, JsonRejection>,
) -> Result<Json<InitiateResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(rejection.body_text(), 400)),
        )
    })?;

    let session = state.service.initiate(request).await.map_err(|e| {
        match e {
            PaymentError::Validation(_) => warn!("Rejected payment request: {}", e),
            _ => error!("Failed to initiate payment: {}", e),
        }
        initiate_error_to_response(&e)
    })?;

    Ok(Json(InitiateResponse {
        success: true,
        order_id: session.order_id,
        vipps_url: session.redirect_url,
    }))
}

/// Vipps callback posted to the bare callback prefix
pub async fn vipps_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CallbackPayload>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    handle_callback(&state, &headers, body, None).await
}

/// Vipps callback on its native path, `{callbackPrefix}/v2/payments/{order_id}`
pub async fn vipps_callback_for_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CallbackPayload>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    handle_callback(&state, &headers, body, Some(order_id)).await
}

/// Shared callback logic: authorize, fetch details, capture if reserved.
///
/// Only a failed details fetch answers 500, so Vipps retries the callback.
#[instrument(skip(state, headers, body))]
async fn handle_callback(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Json<CallbackPayload>, JsonRejection>,
    path_order_id: Option<String>,
) -> Result<StatusCode, ApiError> {
    let Json(payload) = body.map_err(|rejection| {
        warn!("Unreadable Vipps callback: {}", rejection.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(rejection.body_text(), 400)),
        )
    })?;

    let order_id = path_order_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| payload.order_id.clone());

    if order_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing orderId", 400)),
        ));
    }

    info!(
        "Vipps callback received: order={}, transaction={:?}, reported={:?}",
        order_id,
        payload.transaction_id(),
        payload.reported_state()
    );

    if let Some(auth) = &state.callback_auth {
        let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        auth.verify(&order_id, authorization).map_err(|e| {
            warn!("Rejected Vipps callback for {}: {}", order_id, e);
            payment_error_to_response(&e)
        })?;
    }

    match state.service.handle_callback(&order_id).await {
        Ok(CallbackOutcome::Captured(receipt)) => {
            info!(
                "Callback handled: order={} captured {}",
                receipt.order_id, receipt.captured_amount
            );
            Ok(StatusCode::OK)
        }
        Ok(outcome) => {
            info!("Callback handled: order={} outcome={:?}", order_id, outcome);
            Ok(StatusCode::OK)
        }
        Err(e @ PaymentError::Validation(_)) => {
            warn!("Rejected Vipps callback: {}", e);
            Err(payment_error_to_response(&e))
        }
        Err(e) => {
            error!("Callback error for {}: {}", order_id, e);
            Err(payment_error_to_response(&PaymentError::Internal(
                e.to_string(),
            )))
        }
    }
}

/// Proxy the provider's status payload for an order
#[instrument(skip(state))]
pub async fn payment_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let raw = state.service.status(&order_id).await.map_err(|e| {
        match e {
            PaymentError::Validation(_) => warn!("Rejected status lookup: {}", e),
            _ => error!("Status lookup failed for {}: {}", order_id, e),
        }
        payment_error_to_response(&e)
    })?;

    Ok(Json(raw))
}

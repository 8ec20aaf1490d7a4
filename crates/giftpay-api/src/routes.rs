//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET  /health
/// - POST /api/vipps/initiate - Start a payment (called by the site)
/// - POST /api/vipps/callback - Vipps callback, flat body
/// - POST /api/vipps/callback/v2/payments/{order_id} - Vipps callback, native path
/// - GET  /api/vipps/status/{order_id} - Status proxy
pub fn create_router(state: AppState) -> Router {
    // The static site lives on another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let vipps_routes = Router::new()
        .route("/initiate", post(handlers::initiate_payment))
        .route("/callback", post(handlers::vipps_callback))
        .route(
            "/callback/v2/payments/{order_id}",
            post(handlers::vipps_callback_for_order),
        )
        .route("/status/{order_id}", get(handlers::payment_status));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/vipps", vipps_routes)
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // State
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use giftpay_core::{InMemoryOrderRepository, LoggingNotifier, PaymentService};
    use giftpay_vipps::{VippsConfig, VippsEcommProvider};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router() -> Router {
        // Never contacted by these tests
        let provider = VippsEcommProvider::new(
            VippsConfig::new("123456", "id", "secret", "key")
                .with_api_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let service = PaymentService::new(
            Arc::new(provider),
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(LoggingNotifier),
        );
        create_router(AppState::with_service(service, AppConfig::default()))
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = router()
            .oneshot(Request::get("/api/v1/products").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

//! # Payment Service
//!
//! The gift-certificate payment flow:
//!
//! ```text
//! initiate ──► provider checkout ──► buyer approves in Vipps
//!                                          │
//!          callback ◄──────────────────────┘
//!             │ details == Reserved
//!             ▼
//!          capture ──► order Paid ──► "payment captured" email
//! ```
//!
//! Notifications are fire-and-log: a failing email relay never fails a payment
//! step. Capture failures are logged and not retried.

use crate::error::{PaymentError, PaymentResult};
use crate::notify::BoxedNotifier;
use crate::order::{InitiatePaymentRequest, Order, OrderStatus};
use crate::order_id::OrderIdGenerator;
use crate::provider::{BoxedPaymentProvider, CaptureReceipt, PaymentSession, PaymentState};
use crate::repository::BoxedOrderRepository;
use std::future::Future;
use tracing::{error, info, instrument, warn};

/// Default minimum amount in minor units (1 NOK)
pub const DEFAULT_MIN_AMOUNT: i64 = 100;

/// What a provider callback led to
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// Payment was reserved and is now captured
    Captured(CaptureReceipt),
    /// Payment was reserved but the capture call failed (logged, not retried)
    CaptureFailed,
    /// Nothing to capture in this state
    NotReserved(PaymentState),
}

/// Orchestrates initiate, callback, capture and status against a provider
#[derive(Clone)]
pub struct PaymentService {
    provider: BoxedPaymentProvider,
    orders: BoxedOrderRepository,
    notifier: BoxedNotifier,
    order_ids: OrderIdGenerator,
    min_amount: i64,
}

impl PaymentService {
    pub fn new(
        provider: BoxedPaymentProvider,
        orders: BoxedOrderRepository,
        notifier: BoxedNotifier,
    ) -> Self {
        Self {
            provider,
            orders,
            notifier,
            order_ids: OrderIdGenerator::default(),
            min_amount: DEFAULT_MIN_AMOUNT,
        }
    }

    /// Builder: set the minimum amount (minor units)
    pub fn with_min_amount(mut self, min_amount: i64) -> Self {
        self.min_amount = min_amount;
        self
    }

    /// Builder: set the order id generator
    pub fn with_order_ids(mut self, order_ids: OrderIdGenerator) -> Self {
        self.order_ids = order_ids;
        self
    }

    pub fn min_amount(&self) -> i64 {
        self.min_amount
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Start a purchase: validate, open a provider session, store the order,
    /// notify, and return the redirect.
    #[instrument(skip(self, request), fields(certificate_type = %request.certificate_type))]
    pub async fn initiate(&self, request: InitiatePaymentRequest) -> PaymentResult<PaymentSession> {
        // Validation happens before any provider traffic
        let amount = request.validated_amount(self.min_amount)?;
        let order_id = self.order_ids.generate();

        let session = self
            .provider
            .initiate_payment(&order_id, amount, &request)
            .await
            .map_err(|e| {
                error!("Payment initiation failed for {}: {}", order_id, e);
                e
            })?;

        let order = Order::initiated(&order_id, amount, &request);
        self.orders.save(order.clone()).await?;

        info!(
            "Initiated payment: order={}, amount={}, provider={}",
            order_id,
            amount,
            self.provider.provider_name()
        );

        self.notify_best_effort("order initiated", self.notifier.order_initiated(&order))
            .await;

        Ok(session)
    }

    /// Handle a provider callback for `order_id`.
    ///
    /// Only a failed details fetch is an error; capture failures are reported
    /// as `CallbackOutcome::CaptureFailed` so the callback still succeeds.
    #[instrument(skip(self))]
    pub async fn handle_callback(&self, order_id: &str) -> PaymentResult<CallbackOutcome> {
        self.check_order_id(order_id)?;

        let details = self.provider.payment_details(order_id).await.map_err(|e| {
            error!("Failed to fetch payment details for {}: {}", order_id, e);
            e
        })?;

        if !details.state.is_reserved() {
            info!(
                "Callback for {} in state {:?}, nothing to capture",
                order_id, details.state
            );
            return Ok(CallbackOutcome::NotReserved(details.state));
        }

        let amount = match details.reserved_amount.filter(|a| *a > 0) {
            Some(amount) => amount,
            None => match self.orders.find(order_id).await {
                Ok(Some(order)) => order.amount,
                Ok(None) => {
                    error!("Reserved payment {} has no amount and no stored order", order_id);
                    return Ok(CallbackOutcome::CaptureFailed);
                }
                Err(e) => {
                    error!("Order lookup failed for {}: {}", order_id, e);
                    return Ok(CallbackOutcome::CaptureFailed);
                }
            },
        };

        match self.capture(order_id, amount).await {
            Ok(receipt) => Ok(CallbackOutcome::Captured(receipt)),
            Err(e) => {
                // TODO: retry captures with backoff; a failed capture currently
                // leaves the reservation to expire.
                error!("Capture failed for {}: {}", order_id, e);
                Ok(CallbackOutcome::CaptureFailed)
            }
        }
    }

    /// Capture `amount` for `order_id`, mark the order paid and notify.
    #[instrument(skip(self))]
    pub async fn capture(&self, order_id: &str, amount: i64) -> PaymentResult<CaptureReceipt> {
        let receipt = self.provider.capture_payment(order_id, amount).await?;

        info!("Payment captured for order {}: {}", order_id, receipt.captured_amount);

        match self.orders.update_status(order_id, OrderStatus::Paid).await {
            Ok(_) => {}
            Err(PaymentError::OrderNotFound { .. }) => {
                warn!("Captured order {} is not in the order store", order_id);
            }
            Err(e) => error!("Failed to mark order {} paid: {}", order_id, e),
        }

        self.notify_best_effort("payment captured", self.notifier.payment_captured(order_id))
            .await;

        Ok(receipt)
    }

    /// Provider's raw status payload for `order_id`
    pub async fn status(&self, order_id: &str) -> PaymentResult<serde_json::Value> {
        self.check_order_id(order_id)?;
        let details = self.provider.payment_details(order_id).await?;
        Ok(details.raw)
    }

    /// Stored order, if any
    pub async fn find_order(&self, order_id: &str) -> PaymentResult<Option<Order>> {
        self.orders.find(order_id).await
    }

    /// Order ids from clients end up in provider URLs; only ids this service
    /// could have minted get through.
    fn check_order_id(&self, order_id: &str) -> PaymentResult<()> {
        if self.order_ids.is_well_formed(order_id) {
            Ok(())
        } else {
            warn!("Rejected malformed order id {:?}", order_id);
            Err(PaymentError::Validation(format!("Invalid order id: {}", order_id)))
        }
    }

    async fn notify_best_effort<F>(&self, what: &str, notification: F)
    where
        F: Future<Output = PaymentResult<()>>,
    {
        if let Err(e) = notification.await {
            warn!("Failed to send {} notification: {}", what, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use crate::provider::{PaymentDetails, PaymentProvider};
    use crate::repository::{InMemoryOrderRepository, OrderRepository};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeProvider {
        state: Mutex<Option<PaymentState>>,
        reserved_amount: Mutex<Option<i64>>,
        fail_initiate: bool,
        fail_details: bool,
        fail_capture: bool,
        initiate_calls: AtomicUsize,
        details_calls: AtomicUsize,
        capture_calls: AtomicUsize,
        captured: Mutex<Vec<(String, i64)>>,
    }

    impl FakeProvider {
        fn reserved(amount: Option<i64>) -> Self {
            Self {
                state: Mutex::new(Some(PaymentState::Reserved)),
                reserved_amount: Mutex::new(amount),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        async fn initiate_payment(
            &self,
            order_id: &str,
            _amount: i64,
            _request: &InitiatePaymentRequest,
        ) -> PaymentResult<PaymentSession> {
            self.initiate_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_initiate {
                return Err(PaymentError::Provider {
                    provider: "fake".into(),
                    message: "HTTP 400".into(),
                    details: Some(json!({"errorCode": "81"})),
                });
            }
            Ok(PaymentSession {
                order_id: order_id.to_string(),
                redirect_url: format!("https://checkout.example/{}", order_id),
            })
        }

        async fn payment_details(&self, order_id: &str) -> PaymentResult<PaymentDetails> {
            self.details_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_details {
                return Err(PaymentError::Network("timeout".into()));
            }
            let state = self
                .state
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(PaymentState::Initiated);
            Ok(PaymentDetails {
                order_id: order_id.to_string(),
                state,
                reserved_amount: *self.reserved_amount.lock().unwrap(),
                captured_amount: None,
                raw: json!({"orderId": order_id}),
            })
        }

        async fn capture_payment(
            &self,
            order_id: &str,
            amount: i64,
        ) -> PaymentResult<CaptureReceipt> {
            self.capture_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_capture {
                return Err(PaymentError::provider("fake", "capture rejected"));
            }
            self.captured
                .lock()
                .unwrap()
                .push((order_id.to_string(), amount));
            Ok(CaptureReceipt {
                order_id: order_id.to_string(),
                captured_amount: amount,
                transaction_id: Some("tx-1".into()),
            })
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        initiated: AtomicUsize,
        captured: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn order_initiated(&self, _order: &Order) -> PaymentResult<()> {
            self.initiated.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PaymentError::Notification("relay down".into()));
            }
            Ok(())
        }

        async fn payment_captured(&self, _order_id: &str) -> PaymentResult<()> {
            self.captured.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PaymentError::Notification("relay down".into()));
            }
            Ok(())
        }
    }

    struct Fixture {
        provider: Arc<FakeProvider>,
        orders: InMemoryOrderRepository,
        notifier: Arc<RecordingNotifier>,
        service: PaymentService,
    }

    fn fixture(provider: FakeProvider, notifier: RecordingNotifier) -> Fixture {
        let provider = Arc::new(provider);
        let orders = InMemoryOrderRepository::new();
        let notifier = Arc::new(notifier);
        let service = PaymentService::new(
            provider.clone(),
            Arc::new(orders.clone()),
            notifier.clone(),
        );
        Fixture {
            provider,
            orders,
            notifier,
            service,
        }
    }

    fn kari() -> InitiatePaymentRequest {
        InitiatePaymentRequest::new(1500, "Evening Makeup", "Kari", "kari@example.com", "Lise")
    }

    #[tokio::test]
    async fn test_initiate_stores_order_and_returns_redirect() {
        let fx = fixture(FakeProvider::default(), RecordingNotifier::default());

        let session = fx.service.initiate(kari()).await.unwrap();

        assert!(OrderIdGenerator::default().is_well_formed(&session.order_id));
        assert!(!session.redirect_url.is_empty());

        let order = fx.orders.find(&session.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Initiated);
        assert_eq!(order.amount, 1500);
        assert_eq!(order.recipient_name, "Lise");
        assert_eq!(fx.notifier.initiated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initiate_below_minimum_makes_no_provider_call() {
        let fx = fixture(FakeProvider::default(), RecordingNotifier::default());

        let mut request = kari();
        request.amount = Some(50);
        let result = fx.service.initiate(request).await;

        assert!(matches!(result, Err(PaymentError::Validation(_))));
        assert_eq!(fx.provider.initiate_calls.load(Ordering::SeqCst), 0);
        assert!(fx.orders.is_empty().await);
        assert_eq!(fx.notifier.initiated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_initiate_provider_failure_stores_nothing() {
        let provider = FakeProvider {
            fail_initiate: true,
            ..Default::default()
        };
        let fx = fixture(provider, RecordingNotifier::default());

        let err = fx.service.initiate(kari()).await.unwrap_err();

        assert!(err.details().is_some());
        assert!(fx.orders.is_empty().await);
        assert_eq!(fx.notifier.initiated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_initiate() {
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        let fx = fixture(FakeProvider::default(), notifier);

        let session = fx.service.initiate(kari()).await.unwrap();
        assert!(fx.orders.find(&session.order_id).await.unwrap().is_some());
        assert_eq!(fx.notifier.initiated.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_min_amount() {
        let fx = fixture(FakeProvider::default(), RecordingNotifier::default());
        let service = fx.service.clone().with_min_amount(2000);

        assert!(matches!(
            service.initiate(kari()).await,
            Err(PaymentError::Validation(_))
        ));
        assert_eq!(service.min_amount(), 2000);
    }

    #[tokio::test]
    async fn test_reserved_callback_captures_once_and_marks_paid() {
        let fx = fixture(FakeProvider::default(), RecordingNotifier::default());
        let session = fx.service.initiate(kari()).await.unwrap();

        *fx.provider.state.lock().unwrap() = Some(PaymentState::Reserved);
        *fx.provider.reserved_amount.lock().unwrap() = Some(1500);

        let outcome = fx.service.handle_callback(&session.order_id).await.unwrap();

        assert!(matches!(outcome, CallbackOutcome::Captured(ref r) if r.captured_amount == 1500));
        assert_eq!(fx.provider.capture_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            fx.provider.captured.lock().unwrap().as_slice(),
            &[(session.order_id.clone(), 1500)]
        );

        let order = fx.orders.find(&session.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(fx.notifier.captured.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reserved_without_amount_falls_back_to_order_amount() {
        let fx = fixture(FakeProvider::default(), RecordingNotifier::default());
        let session = fx.service.initiate(kari()).await.unwrap();
        *fx.provider.state.lock().unwrap() = Some(PaymentState::Reserved);

        fx.service.handle_callback(&session.order_id).await.unwrap();

        assert_eq!(
            fx.provider.captured.lock().unwrap().as_slice(),
            &[(session.order_id.clone(), 1500)]
        );
    }

    #[tokio::test]
    async fn test_non_reserved_callback_does_not_capture() {
        let fx = fixture(FakeProvider::default(), RecordingNotifier::default());
        let session = fx.service.initiate(kari()).await.unwrap();

        let outcome = fx.service.handle_callback(&session.order_id).await.unwrap();

        assert_eq!(outcome, CallbackOutcome::NotReserved(PaymentState::Initiated));
        assert_eq!(fx.provider.capture_calls.load(Ordering::SeqCst), 0);
        let order = fx.orders.find(&session.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Initiated);
    }

    #[tokio::test]
    async fn test_details_failure_is_an_error() {
        let provider = FakeProvider {
            fail_details: true,
            ..Default::default()
        };
        let fx = fixture(provider, RecordingNotifier::default());

        let result = fx.service.handle_callback("OBM3X9K2Q1A7F2Z").await;
        assert!(matches!(result, Err(PaymentError::Network(_))));
    }

    #[tokio::test]
    async fn test_capture_failure_is_logged_not_propagated() {
        let provider = FakeProvider {
            fail_capture: true,
            ..FakeProvider::reserved(Some(1500))
        };
        let fx = fixture(provider, RecordingNotifier::default());
        let session = fx.service.initiate(kari()).await.unwrap();

        let outcome = fx.service.handle_callback(&session.order_id).await.unwrap();

        assert_eq!(outcome, CallbackOutcome::CaptureFailed);
        assert_eq!(fx.provider.capture_calls.load(Ordering::SeqCst), 1);
        let order = fx.orders.find(&session.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Initiated);
        assert_eq!(fx.notifier.captured.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_capture_of_unknown_order_still_succeeds() {
        let fx = fixture(FakeProvider::reserved(Some(900)), RecordingNotifier::default());

        let outcome = fx.service.handle_callback("OBELSEWHERE1").await.unwrap();

        assert!(matches!(outcome, CallbackOutcome::Captured(_)));
        assert!(fx.orders.is_empty().await);
    }

    #[tokio::test]
    async fn test_reserved_unknown_order_without_amount_skips_capture() {
        let fx = fixture(FakeProvider::reserved(None), RecordingNotifier::default());

        let outcome = fx.service.handle_callback("OBELSEWHERE1").await.unwrap();

        assert_eq!(outcome, CallbackOutcome::CaptureFailed);
        assert_eq!(fx.provider.capture_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_status_returns_raw_payload() {
        let fx = fixture(FakeProvider::default(), RecordingNotifier::default());
        let raw = fx.service.status("OBM3X9K2Q1A7F2Z").await.unwrap();
        assert_eq!(raw, json!({"orderId": "OBM3X9K2Q1A7F2Z"}));
        assert_eq!(fx.provider.details_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_order_ids_never_reach_the_provider() {
        let fx = fixture(FakeProvider::reserved(Some(1500)), RecordingNotifier::default());

        for id in [
            "../../../internal/merchant-secrets?x=",
            "OB12345/../../accesstoken/get",
            "OBM3X9K2Q1A7F2Z?x=1",
            "ob m3x9k2q1",
            "OB42",
            "",
        ] {
            assert!(matches!(
                fx.service.status(id).await,
                Err(PaymentError::Validation(_))
            ));
            assert!(matches!(
                fx.service.handle_callback(id).await,
                Err(PaymentError::Validation(_))
            ));
        }

        assert_eq!(fx.provider.details_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.provider.capture_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_custom_prefix_ids_are_accepted() {
        let mut fx = fixture(FakeProvider::default(), RecordingNotifier::default());
        fx.service = fx
            .service
            .clone()
            .with_order_ids(OrderIdGenerator::new("GB").unwrap());

        assert!(fx.service.status("GBM3X9K2Q1A7F2Z").await.is_ok());
        assert!(matches!(
            fx.service.status("OBM3X9K2Q1A7F2Z").await,
            Err(PaymentError::Validation(_))
        ));
    }
}

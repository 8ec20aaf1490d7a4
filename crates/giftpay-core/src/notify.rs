//! # Notifications
//!
//! Milestone emails (order initiated, payment captured). Delivery is best
//! effort: the payment flow logs a `PaymentError::Notification` and moves on.

use crate::error::PaymentResult;
use crate::order::Order;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Notification sink for payment milestones
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called after a checkout session was opened and the order stored
    async fn order_initiated(&self, order: &Order) -> PaymentResult<()>;

    /// Called after a reserved payment was captured
    async fn payment_captured(&self, order_id: &str) -> PaymentResult<()>;
}

/// Type alias for a shared notifier
pub type BoxedNotifier = Arc<dyn Notifier>;

/// Notifier that only logs (used when no relay is configured)
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn order_initiated(&self, order: &Order) -> PaymentResult<()> {
        info!(
            "Order initiated: id={}, type={}, amount={}",
            order.order_id, order.certificate_type, order.amount
        );
        Ok(())
    }

    async fn payment_captured(&self, order_id: &str) -> PaymentResult<()> {
        info!("Payment captured: id={}", order_id);
        Ok(())
    }
}

//! # giftpay-core
//!
//! Core types and traits for the giftpay gift-certificate payment backend.
//!
//! This crate provides:
//! - `PaymentProvider` trait for the hosted-checkout provider (Vipps)
//! - `Order`, `OrderStatus` and `InitiatePaymentRequest` for the purchase flow
//! - `OrderIdGenerator` for shareable order ids
//! - `OrderRepository` with an in-memory implementation
//! - `Notifier` for best-effort milestone emails
//! - `PaymentService` tying the flow together
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use giftpay_core::{InitiatePaymentRequest, PaymentService};
//!
//! let service = PaymentService::new(provider, repository, notifier);
//!
//! let request =
//!     InitiatePaymentRequest::new(1500, "Evening Makeup", "Kari", "kari@example.com", "Lise");
//! let session = service.initiate(request).await?;
//!
//! // Redirect the buyer to session.redirect_url
//! ```

pub mod error;
pub mod notify;
pub mod order;
pub mod order_id;
pub mod provider;
pub mod repository;
pub mod service;

// Re-exports for convenience
pub use error::{PaymentError, PaymentResult};
pub use notify::{BoxedNotifier, LoggingNotifier, Notifier};
pub use order::{format_nok, InitiatePaymentRequest, Order, OrderStatus};
pub use order_id::OrderIdGenerator;
pub use provider::{
    BoxedPaymentProvider, CaptureReceipt, PaymentDetails, PaymentProvider, PaymentSession,
    PaymentState,
};
pub use repository::{BoxedOrderRepository, InMemoryOrderRepository, OrderRepository};
pub use service::{CallbackOutcome, PaymentService, DEFAULT_MIN_AMOUNT};

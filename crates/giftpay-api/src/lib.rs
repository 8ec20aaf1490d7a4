//! # giftpay-api
//!
//! HTTP API layer for giftpay.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Vipps payment endpoints (initiate, callback, status)
//! - FormSubmit notification relay
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/vipps/initiate` | Start a gift-certificate payment |
//! | POST | `/api/vipps/callback` | Vipps callback (flat body) |
//! | POST | `/api/vipps/callback/v2/payments/{order_id}` | Vipps callback (native path) |
//! | GET | `/api/vipps/status/{order_id}` | Payment status proxy |

pub mod handlers;
pub mod notify;
pub mod routes;
pub mod state;

pub use notify::FormSubmitNotifier;
pub use routes::create_router;
pub use state::{AppConfig, AppState};

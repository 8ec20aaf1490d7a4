//! # giftpay
//!
//! Vipps payment backend for gift certificates.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export VIPPS_MSN=123456
//! export VIPPS_CLIENT_ID=...
//! export VIPPS_CLIENT_SECRET=...
//! export VIPPS_SUBSCRIPTION_KEY=...
//! export APP_URL=https://olgaberge.up.railway.app
//!
//! # Run the server
//! giftpay
//! ```

use giftpay_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Initialize application state
    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;

    info!("Environment: {}", state.config.environment);
    info!("Public URL: {}", state.config.app_url);
    info!(
        "Minimum amount: {}",
        giftpay_core::format_nok(state.service.min_amount())
    );

    // Create router
    let app = routes::create_router(state);

    info!("giftpay v{} listening on http://{}", env!("CARGO_PKG_VERSION"), addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

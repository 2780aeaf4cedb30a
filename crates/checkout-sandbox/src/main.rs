//! # Checkout Sandbox
//!
//! Local settlement endpoint for the checkout widgets.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export SANDBOX_API_TOKEN=sandbox-token
//! export PROMPTPAY_RECEIVER_ID=0812345678
//!
//! # Run the server
//! checkout-sandbox
//! ```

use checkout_sandbox::{routes, state::AppState};
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

    print_banner();

    let state = AppState::from_env();

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("PromptPay receiver: {}", state.config.promptpay_receiver_id);

    let app = routes::create_router(state);

    info!("Checkout sandbox starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Card: POST http://{}/api/payments/stripe", addr);
        info!("PromptPay: POST http://{}/api/payments/promptpay", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  Checkout Sandbox
  ━━━━━━━━━━━━━━━━━━━━━━━
  Local settlement endpoint
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}

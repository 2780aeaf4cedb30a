//! # checkout-methods
//!
//! Payment widgets and the settlement boundary for storefront checkout.
//!
//! This crate provides two payment methods behind one contract:
//!
//! 1. **CardWidget** - card-like form
//!    - Input masks for number, expiry and CVV
//!    - Local validation, single-use token per attempt
//!    - `completed` on success
//!
//! 2. **QrWidget** - PromptPay-style QR transfer
//!    - Display-only payment string, advisory 10 minute window
//!    - Shopper confirms the transfer
//!    - `pending-verification` on success
//!
//! Both talk to the backend through a [`SettlementGateway`]; the HTTP
//! implementation is [`HttpSettlementClient`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_methods::{CheckoutOrchestrator, HttpSettlementClient, SettlementConfig};
//! use checkout_core::{Amount, Currency, MethodKind};
//! use std::sync::Arc;
//!
//! let config = SettlementConfig::from_env()?;
//! let gateway = Arc::new(HttpSettlementClient::from_config(config.clone())?);
//!
//! let checkout = CheckoutOrchestrator::with_default_methods(
//!     Amount::new(899.99)?,
//!     Currency::THB,
//!     gateway,
//!     &config,
//! );
//!
//! checkout.select(MethodKind::Card)?;
//! // ... the shopper fills the card form ...
//! let result = checkout.pay().await?;
//! assert!(checkout.can_fulfil());
//! ```
//!
//! ## Environment Variables
//!
//! ```bash
//! PROMPTPAY_RECEIVER_ID=0812345678
//! CHECKOUT_API_BASE_URL=http://localhost:5000/api
//! CHECKOUT_API_TOKEN=...
//! CHECKOUT_TIMEOUT_SECS=30
//! ```

pub mod auth;
pub mod card;
pub mod client;
pub mod config;
mod flight;
pub mod orchestrator;
pub mod qr;
pub mod token;

#[cfg(test)]
mod testing;

pub use auth::{AuthTokenSource, SharedToken, StaticToken};
pub use card::{
    format_card_number, format_cvv, format_expiry, mask_card_number, CardForm, CardPhase,
    CardWidget,
};
pub use client::{HttpSettlementClient, SettlementGateway, SharedGateway};
pub use config::SettlementConfig;
pub use orchestrator::{CheckoutOrchestrator, OrderPaymentState};
pub use qr::{payment_string, QrPhase, QrSession, QrWidget};
pub use token::{CardToken, CardTokenizer};

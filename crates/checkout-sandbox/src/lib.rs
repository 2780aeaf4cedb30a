//! # checkout-sandbox
//!
//! A local stand-in for the backend settlement endpoint the checkout
//! widgets talk to. Useful for development and end-to-end tests.
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/payments/stripe` | Card-like settlement |
//! | POST | `/api/payments/promptpay` | QR transfer confirmation |
//!
//! Requests need `Authorization: Bearer <SANDBOX_API_TOKEN>`. A repeated
//! `Idempotency-Key` replays the stored reply; the same key with another
//! body is rejected with 422.

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppState, SandboxConfig};

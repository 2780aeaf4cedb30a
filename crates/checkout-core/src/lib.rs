//! # checkout-core
//!
//! Core types and traits for the storefront checkout payment-method contract.
//!
//! This crate provides:
//! - `PaymentMethod` trait every checkout payment method implements
//! - `PaymentRequest`, `PaymentResult` and the settlement wire envelope
//! - `Amount` and `Currency`
//! - `BusyFlag`, the checkout's single composed processing flag
//! - `MethodRegistry` for the methods offered at checkout
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{Amount, Currency, MethodKind, MethodRegistry, WidgetProps};
//!
//! let props = WidgetProps::new(Amount::new(899.99)?, Currency::THB);
//!
//! let registry = MethodRegistry::new(MethodKind::Card)
//!     .with_method(card_widget)
//!     .with_method(qr_widget);
//!
//! let result = registry.default_method().unwrap().submit().await?;
//! ```

pub mod amount;
pub mod busy;
pub mod error;
pub mod method;
pub mod payment;

// Re-exports for convenience
pub use amount::{Amount, Currency};
pub use busy::{BusyFlag, BusyGuard, OrderGate};
pub use error::{CheckoutError, CheckoutResult, Field, ValidationError};
pub use method::{
    FieldView, MethodRegistry, NoopListener, PaymentListener, PaymentMethod,
    SharedPaymentMethod, WidgetProps, WidgetView,
};
pub use payment::{
    new_reference, CardCharge, MethodKind, MethodPayload, PaymentRequest, PaymentResult,
    PaymentStatus, PromptPayCharge, SettlementEnvelope, SettlementReceipt,
};

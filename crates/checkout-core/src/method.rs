//! # Payment Method Contract
//!
//! Every checkout payment method (card-like, QR transfer, ...) implements
//! [`PaymentMethod`], so the orchestrator can drive them uniformly:
//! `select -> submit -> {completed | pending | failed}`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentMethod (trait)                    │
//! │  ├── render()    pure view of local state + props           │
//! │  ├── submit()    validate, tokenize, one settlement call    │
//! │  └── reset()     back to the initial phase                  │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                  ┌─────────┴─────────┐
//!          ┌───────┴───────┐   ┌───────┴───────┐
//!          │  CardWidget   │   │   QrWidget    │
//!          └───────────────┘   └───────────────┘
//! ```
//!
//! Each method also exposes its own local `validate` and `tokenize`; those
//! are method-specific (different inputs) and live on the concrete types.

use crate::amount::{Amount, Currency};
use crate::busy::{BusyFlag, OrderGate};
use crate::error::{CheckoutResult, Field};
use crate::payment::{MethodKind, PaymentResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Callbacks a widget reports to.
///
/// `on_success` is called exactly once per successful attempt; `on_error`
/// on every failed settlement attempt.
pub trait PaymentListener: Send + Sync {
    fn on_success(&self, result: &PaymentResult);

    fn on_error(&self, method: MethodKind, message: &str);
}

/// Listener that ignores every callback
pub struct NoopListener;

impl PaymentListener for NoopListener {
    fn on_success(&self, _result: &PaymentResult) {}

    fn on_error(&self, _method: MethodKind, _message: &str) {}
}

/// Inputs the orchestrator passes down to a widget
#[derive(Clone)]
pub struct WidgetProps {
    pub amount: Amount,
    pub currency: Currency,
    /// The checkout's single composed processing flag
    pub processing: BusyFlag,
    /// Closed once the order is paid or awaiting confirmation
    pub order: OrderGate,
    pub listener: Arc<dyn PaymentListener>,
}

impl WidgetProps {
    pub fn new(amount: Amount, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            processing: BusyFlag::new(),
            order: OrderGate::new(),
            listener: Arc::new(NoopListener),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn PaymentListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_processing(mut self, processing: BusyFlag) -> Self {
        self.processing = processing;
        self
    }

    pub fn with_order_gate(mut self, order: OrderGate) -> Self {
        self.order = order;
        self
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_busy()
    }

    /// Whether the order already has a successful settlement
    pub fn is_order_closed(&self) -> bool {
        self.order.is_closed()
    }
}

impl fmt::Debug for WidgetProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetProps")
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .field("processing", &self.processing.is_busy())
            .field("order_closed", &self.order.is_closed())
            .finish()
    }
}

/// One input field as rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub field: Field,
    pub label: &'static str,
    pub value: String,
    pub placeholder: &'static str,
    /// Render as a password-style input
    pub masked: bool,
}

/// Render output of a widget: a view model, free of side effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub method: MethodKind,
    pub phase: &'static str,
    /// Formatted amount (e.g. "฿899.99")
    pub amount_label: String,
    pub fields: Vec<FieldView>,
    /// Inputs and actions disabled
    pub disabled: bool,
    pub error: Option<String>,
    pub primary_action: String,
    pub secondary_action: Option<String>,
    /// Display-only payment string (QR methods)
    pub payment_string: Option<String>,
    /// Seconds left in an advisory validity window
    pub expires_in_secs: Option<i64>,
    pub expired: bool,
    pub notice: Option<String>,
}

impl WidgetView {
    pub fn new(method: MethodKind, phase: &'static str, props: &WidgetProps) -> Self {
        Self {
            method,
            phase,
            amount_label: props.amount.display(props.currency),
            fields: Vec::new(),
            disabled: props.is_processing() || props.is_order_closed(),
            error: None,
            primary_action: String::new(),
            secondary_action: None,
            payment_string: None,
            expires_in_secs: None,
            expired: false,
            notice: None,
        }
    }

    pub fn field(&self, field: Field) -> Option<&FieldView> {
        self.fields.iter().find(|f| f.field == field)
    }
}

/// Core trait for checkout payment methods.
#[async_trait]
pub trait PaymentMethod: Send + Sync {
    /// Which method this is
    fn kind(&self) -> MethodKind;

    /// Name of the current state-machine phase
    fn phase(&self) -> &'static str;

    /// Pure view of local state and props
    fn render(&self) -> WidgetView;

    /// Run one settlement attempt.
    ///
    /// Validates locally, tokenizes, and makes at most one network call.
    /// On success the listener's `on_success` fires once and further
    /// submissions are refused until [`PaymentMethod::reset`].
    async fn submit(&self) -> CheckoutResult<PaymentResult>;

    /// Return to the initial phase, discarding local state
    fn reset(&self);

    /// Whether the method reached its terminal success phase
    fn is_settled(&self) -> bool;
}

/// Type alias for a shared payment method (dynamic dispatch)
pub type SharedPaymentMethod = Arc<dyn PaymentMethod>;

/// Registry of the methods offered at checkout
#[derive(Clone)]
pub struct MethodRegistry {
    methods: HashMap<MethodKind, SharedPaymentMethod>,
    order: Vec<MethodKind>,
    default_method: MethodKind,
}

impl MethodRegistry {
    /// Create a registry with a default method
    pub fn new(default_method: MethodKind) -> Self {
        Self {
            methods: HashMap::new(),
            order: Vec::new(),
            default_method,
        }
    }

    /// Register a method; replaces any method of the same kind
    pub fn register(&mut self, method: SharedPaymentMethod) {
        let kind = method.kind();
        if self.methods.insert(kind, method).is_none() {
            self.order.push(kind);
        }
    }

    /// Register with builder pattern
    pub fn with_method(mut self, method: SharedPaymentMethod) -> Self {
        self.register(method);
        self
    }

    pub fn get(&self, kind: MethodKind) -> Option<&SharedPaymentMethod> {
        self.methods.get(&kind)
    }

    pub fn default_method(&self) -> Option<&SharedPaymentMethod> {
        self.methods
            .get(&self.default_method)
            .or_else(|| self.order.first().and_then(|k| self.methods.get(k)))
    }

    /// Registered kinds, in registration order
    pub fn kinds(&self) -> &[MethodKind] {
        &self.order
    }

    pub fn contains(&self, kind: MethodKind) -> bool {
        self.methods.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new(MethodKind::Card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentStatus;
    use chrono::Utc;

    struct FixedMethod(MethodKind);

    #[async_trait]
    impl PaymentMethod for FixedMethod {
        fn kind(&self) -> MethodKind {
            self.0
        }

        fn phase(&self) -> &'static str {
            "idle"
        }

        fn render(&self) -> WidgetView {
            let props = WidgetProps::new(Amount::new(1.0).unwrap(), Currency::THB);
            WidgetView::new(self.0, "idle", &props)
        }

        async fn submit(&self) -> CheckoutResult<PaymentResult> {
            Ok(PaymentResult {
                method: self.0,
                transaction_id: "txn".to_string(),
                status: PaymentStatus::Completed,
                reference: None,
                received_at: Utc::now(),
            })
        }

        fn reset(&self) {}

        fn is_settled(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = MethodRegistry::new(MethodKind::Card);
        assert!(registry.is_empty());
        assert!(registry.default_method().is_none());
    }

    #[test]
    fn test_registry_default_fallback() {
        let registry = MethodRegistry::new(MethodKind::Card)
            .with_method(Arc::new(FixedMethod(MethodKind::PromptPay)));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.default_method().unwrap().kind(),
            MethodKind::PromptPay
        );

        let registry = registry.with_method(Arc::new(FixedMethod(MethodKind::Card)));
        assert_eq!(registry.default_method().unwrap().kind(), MethodKind::Card);
        assert_eq!(registry.kinds(), &[MethodKind::PromptPay, MethodKind::Card]);
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let method: SharedPaymentMethod = Arc::new(FixedMethod(MethodKind::Card));
        let result = method.submit().await.unwrap();
        assert_eq!(result.method, MethodKind::Card);
    }

    #[test]
    fn test_view_disabled_follows_processing_flag() {
        let props = WidgetProps::new(Amount::new(899.99).unwrap(), Currency::THB);
        let _guard = props.processing.try_acquire().unwrap();

        let view = WidgetView::new(MethodKind::Card, "editing", &props);
        assert!(view.disabled);
        assert_eq!(view.amount_label, "฿899.99");
    }

    #[test]
    fn test_view_disabled_once_order_closed() {
        let props = WidgetProps::new(Amount::new(899.99).unwrap(), Currency::THB);
        props.order.close();

        let view = WidgetView::new(MethodKind::PromptPay, "idle", &props);
        assert!(view.disabled);
        assert!(!props.is_processing());
    }
}

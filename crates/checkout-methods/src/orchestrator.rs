//! # Checkout Orchestrator
//!
//! Owns the checkout's method registry, the active selection, the single
//! processing flag and the order's payment state. Widgets report to it
//! through the [`PaymentListener`] it hands out in [`WidgetProps`], so the
//! order state follows the widget outcome whether the shopper submits
//! through [`CheckoutOrchestrator::pay`] or through the widget directly.
//!
//! ```text
//!                      ┌── completed ─────────────▶ Paid
//!   AwaitingPayment ───┤
//!                      └── pending-verification ──▶ AwaitingConfirmation
//!                                                        │
//!                               confirm_settlement(id) ──┘──▶ Paid
//! ```

use crate::client::SharedGateway;
use crate::config::SettlementConfig;
use crate::card::CardWidget;
use crate::flight::lock;
use crate::qr::QrWidget;
use checkout_core::{
    Amount, BusyFlag, BusyGuard, CheckoutError, CheckoutResult, Currency, MethodKind,
    MethodRegistry, OrderGate, PaymentListener, PaymentMethod, PaymentResult, PaymentStatus,
    SharedPaymentMethod, WidgetProps, WidgetView,
};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// Payment state of the order being checked out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderPaymentState {
    AwaitingPayment,
    /// Settled; fulfilment may proceed
    Paid(PaymentResult),
    /// Accepted by the backend but not yet verified
    AwaitingConfirmation(PaymentResult),
}

impl OrderPaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentState::AwaitingPayment => "awaiting-payment",
            OrderPaymentState::Paid(_) => "paid",
            OrderPaymentState::AwaitingConfirmation(_) => "awaiting-confirmation",
        }
    }

    pub fn result(&self) -> Option<&PaymentResult> {
        match self {
            OrderPaymentState::AwaitingPayment => None,
            OrderPaymentState::Paid(result) | OrderPaymentState::AwaitingConfirmation(result) => {
                Some(result)
            }
        }
    }
}

struct OrderLedger {
    payment: OrderPaymentState,
    last_error: Option<String>,
}

/// Listener handed to every widget; applies outcomes to the order
struct OrderTracker {
    ledger: Mutex<OrderLedger>,
    /// Closed on the first accepted settlement
    gate: OrderGate,
    outer: Mutex<Option<Arc<dyn PaymentListener>>>,
}

impl OrderTracker {
    fn new() -> Self {
        Self {
            ledger: Mutex::new(OrderLedger {
                payment: OrderPaymentState::AwaitingPayment,
                last_error: None,
            }),
            gate: OrderGate::new(),
            outer: Mutex::new(None),
        }
    }

    fn outer(&self) -> Option<Arc<dyn PaymentListener>> {
        lock(&self.outer).clone()
    }

    fn record_error(&self, message: &str) {
        lock(&self.ledger).last_error = Some(message.to_string());
    }

    fn apply(&self, ledger: &mut OrderLedger, result: &PaymentResult) {
        match result.status {
            PaymentStatus::Completed => {
                ledger.payment = OrderPaymentState::Paid(result.clone());
                ledger.last_error = None;
                self.gate.close();
            }
            PaymentStatus::PendingVerification => {
                ledger.payment = OrderPaymentState::AwaitingConfirmation(result.clone());
                ledger.last_error = None;
                self.gate.close();
            }
            PaymentStatus::Failed => {
                ledger.last_error = Some("Payment failed".to_string());
            }
        }
    }
}

impl PaymentListener for OrderTracker {
    fn on_success(&self, result: &PaymentResult) {
        {
            let mut ledger = lock(&self.ledger);
            if ledger.payment == OrderPaymentState::AwaitingPayment {
                self.apply(&mut ledger, result);
            } else {
                // The order keeps the settlement it already has
                warn!(
                    "Ignoring {:?} result {} for an order already {}",
                    result.status,
                    result.transaction_id,
                    ledger.payment.as_str()
                );
            }
        }

        if let Some(outer) = self.outer() {
            outer.on_success(result);
        }
    }

    fn on_error(&self, method: MethodKind, message: &str) {
        self.record_error(message);

        if let Some(outer) = self.outer() {
            outer.on_error(method, message);
        }
    }
}

/// Drives one checkout across its registered payment methods
pub struct CheckoutOrchestrator {
    amount: Amount,
    currency: Currency,
    processing: BusyFlag,
    registry: MethodRegistry,
    selected: Mutex<Option<MethodKind>>,
    tracker: Arc<OrderTracker>,
}

impl CheckoutOrchestrator {
    pub fn new(amount: Amount, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            processing: BusyFlag::new(),
            registry: MethodRegistry::default(),
            selected: Mutex::new(None),
            tracker: Arc::new(OrderTracker::new()),
        }
    }

    /// Checkout offering the card and PromptPay widgets against one gateway
    pub fn with_default_methods(
        amount: Amount,
        currency: Currency,
        gateway: SharedGateway,
        config: &SettlementConfig,
    ) -> Self {
        let mut checkout = Self::new(amount, currency);

        let card = CardWidget::new(gateway.clone(), checkout.props()).with_timeout(config.timeout());
        let qr = QrWidget::from_config(gateway, checkout.props(), config);

        checkout.register(Arc::new(card));
        checkout.register(Arc::new(qr));
        checkout
    }

    /// Builder: also report outcomes to a host listener
    pub fn with_listener(self, listener: Arc<dyn PaymentListener>) -> Self {
        *lock(&self.tracker.outer) = Some(listener);
        self
    }

    /// Builder: method selected until the shopper picks another
    pub fn with_default_method(mut self, kind: MethodKind) -> Self {
        let mut registry = MethodRegistry::new(kind);
        for kind in self.registry.kinds() {
            if let Some(method) = self.registry.get(*kind) {
                registry.register(method.clone());
            }
        }
        self.registry = registry;
        self
    }

    /// Props for a widget of this checkout
    pub fn props(&self) -> WidgetProps {
        WidgetProps::new(self.amount, self.currency)
            .with_processing(self.processing.clone())
            .with_order_gate(self.tracker.gate.clone())
            .with_listener(self.tracker.clone())
    }

    pub fn register(&mut self, method: SharedPaymentMethod) {
        info!("Registered payment method: {}", method.kind());
        self.registry.register(method);
    }

    pub fn with_method(mut self, method: SharedPaymentMethod) -> Self {
        self.register(method);
        self
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn methods(&self) -> &[MethodKind] {
        self.registry.kinds()
    }

    pub fn method(&self, kind: MethodKind) -> Option<&SharedPaymentMethod> {
        self.registry.get(kind)
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_busy()
    }

    /// Switch the active method; refused while a submission is in flight
    pub fn select(&self, kind: MethodKind) -> CheckoutResult<()> {
        if self.processing.is_busy() {
            return Err(CheckoutError::Busy);
        }

        if !self.registry.contains(kind) {
            return Err(CheckoutError::Configuration(format!(
                "Payment method {} is not available",
                kind
            )));
        }

        *lock(&self.selected) = Some(kind);
        Ok(())
    }

    /// Currently selected method
    pub fn active(&self) -> CheckoutResult<SharedPaymentMethod> {
        let selected = *lock(&self.selected);
        let method = match selected {
            Some(kind) => self.registry.get(kind),
            None => self.registry.default_method(),
        };

        method
            .cloned()
            .ok_or_else(|| CheckoutError::Configuration("No payment methods registered".to_string()))
    }

    pub fn active_kind(&self) -> Option<MethodKind> {
        self.active().ok().map(|m| m.kind())
    }

    /// View of the active method
    pub fn render(&self) -> CheckoutResult<WidgetView> {
        Ok(self.active()?.render())
    }

    /// Submit through the active method and apply the outcome
    #[instrument(skip(self))]
    pub async fn pay(&self) -> CheckoutResult<PaymentResult> {
        let state = self.payment_state();
        if state != OrderPaymentState::AwaitingPayment {
            return Err(CheckoutError::InvalidState {
                action: "pay",
                phase: state.as_str(),
            });
        }

        let method = self.active()?;
        match method.submit().await {
            Ok(result) => {
                info!(
                    "Order payment {} via {}: {}",
                    self.payment_state().as_str(),
                    result.method,
                    result.transaction_id
                );
                Ok(result)
            }
            Err(CheckoutError::Validation(err)) => {
                self.tracker.record_error(&err.reason);
                Err(CheckoutError::Validation(err))
            }
            Err(err) => Err(err),
        }
    }

    pub fn payment_state(&self) -> OrderPaymentState {
        lock(&self.tracker.ledger).payment.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.tracker.ledger).last_error.clone()
    }

    /// Only a `completed` result grants fulfilment
    pub fn can_fulfil(&self) -> bool {
        matches!(self.payment_state(), OrderPaymentState::Paid(_))
    }

    /// Apply an out-of-band confirmation of a pending transfer
    pub fn confirm_settlement(&self, transaction_id: &str) -> CheckoutResult<PaymentResult> {
        let mut ledger = lock(&self.tracker.ledger);

        let pending = match &ledger.payment {
            OrderPaymentState::AwaitingConfirmation(result) => result,
            other => {
                return Err(CheckoutError::InvalidState {
                    action: "confirm settlement",
                    phase: other.as_str(),
                })
            }
        };

        if pending.transaction_id != transaction_id {
            warn!(
                "Settlement confirmation for unknown transaction {} (pending {})",
                transaction_id, pending.transaction_id
            );
            return Err(CheckoutError::Business {
                status: 409,
                message: format!("Transaction {} is not awaiting confirmation", transaction_id),
            });
        }

        let confirmed = PaymentResult {
            status: PaymentStatus::Completed,
            ..pending.clone()
        };
        ledger.payment = OrderPaymentState::Paid(confirmed.clone());

        info!("Order paid after confirmation: {}", transaction_id);
        Ok(confirmed)
    }

    /// Hold the processing flag for host-side work; disables every widget
    pub fn begin_external_processing(&self) -> CheckoutResult<BusyGuard> {
        self.processing.try_acquire().ok_or(CheckoutError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockGateway, RecordingListener};

    struct Fixture {
        checkout: Arc<CheckoutOrchestrator>,
        card: Arc<CardWidget>,
        qr: Arc<QrWidget>,
        gateway: Arc<MockGateway>,
        listener: Arc<RecordingListener>,
    }

    fn fixture(gateway: MockGateway, amount: f64) -> Fixture {
        let gateway = Arc::new(gateway);
        let listener = Arc::new(RecordingListener::default());
        let mut checkout = CheckoutOrchestrator::new(Amount::new(amount).unwrap(), Currency::THB)
            .with_listener(listener.clone());

        let card = Arc::new(CardWidget::new(gateway.clone(), checkout.props()));
        let qr = Arc::new(QrWidget::new(gateway.clone(), checkout.props(), "0812345678"));
        checkout.register(card.clone());
        checkout.register(qr.clone());

        Fixture {
            checkout: Arc::new(checkout),
            card,
            qr,
            gateway,
            listener,
        }
    }

    fn fill_card(card: &CardWidget) {
        card.set_cardholder_name("Jane Doe").unwrap();
        card.set_card_number("4242 4242 4242 4242").unwrap();
        card.set_expiry("12/29").unwrap();
        card.set_cvv("123").unwrap();
    }

    #[test]
    fn test_default_methods() {
        let config = SettlementConfig::new("http://localhost:5000/api", "0812345678");
        let checkout = CheckoutOrchestrator::with_default_methods(
            Amount::new(100.0).unwrap(),
            Currency::THB,
            Arc::new(MockGateway::succeeding("txn")),
            &config,
        );

        assert_eq!(checkout.methods(), &[MethodKind::Card, MethodKind::PromptPay]);
        assert_eq!(checkout.active_kind(), Some(MethodKind::Card));
        assert_eq!(checkout.payment_state(), OrderPaymentState::AwaitingPayment);

        let checkout = checkout.with_default_method(MethodKind::PromptPay);
        assert_eq!(checkout.active_kind(), Some(MethodKind::PromptPay));
        assert_eq!(checkout.render().unwrap().method, MethodKind::PromptPay);
    }

    #[tokio::test]
    async fn test_card_payment_marks_order_paid() {
        let f = fixture(MockGateway::succeeding("txn_card"), 899.99);
        fill_card(&f.card);

        let result = f.checkout.pay().await.unwrap();

        assert_eq!(result.status, PaymentStatus::Completed);
        assert!(f.checkout.can_fulfil());
        assert_eq!(f.checkout.payment_state(), OrderPaymentState::Paid(result.clone()));
        assert_eq!(f.gateway.calls()[0].body()["amount"], serde_json::json!(900));
        assert_eq!(f.listener.successes(), vec![result]);
        assert!(f.checkout.last_error().is_none());

        let err = f.checkout.pay().await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidState { phase: "paid", .. }));
        assert_eq!(f.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_qr_payment_awaits_confirmation() {
        let f = fixture(MockGateway::succeeding("txn_qr"), 500.0);
        f.checkout.select(MethodKind::PromptPay).unwrap();
        f.qr.generate().unwrap();

        let result = f.checkout.pay().await.unwrap();

        assert_eq!(result.status, PaymentStatus::PendingVerification);
        assert!(!f.checkout.can_fulfil());
        assert_eq!(f.checkout.payment_state().as_str(), "awaiting-confirmation");

        let err = f.checkout.confirm_settlement("txn_other").unwrap_err();
        assert!(matches!(err, CheckoutError::Business { status: 409, .. }));
        assert!(!f.checkout.can_fulfil());

        let confirmed = f.checkout.confirm_settlement("txn_qr").unwrap();
        assert_eq!(confirmed.status, PaymentStatus::Completed);
        assert_eq!(confirmed.reference, result.reference);
        assert!(f.checkout.can_fulfil());
    }

    #[test]
    fn test_confirm_settlement_requires_pending_payment() {
        let f = fixture(MockGateway::succeeding("txn"), 500.0);
        let err = f.checkout.confirm_settlement("txn").unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidState {
                phase: "awaiting-payment",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_payment_records_error() {
        let f = fixture(MockGateway::failing(401, "Not authorized, token failed"), 899.99);
        fill_card(&f.card);

        let err = f.checkout.pay().await.unwrap_err();

        assert_eq!(err.user_message(), "Not authorized, token failed");
        assert_eq!(f.checkout.payment_state(), OrderPaymentState::AwaitingPayment);
        assert_eq!(
            f.checkout.last_error().as_deref(),
            Some("Not authorized, token failed")
        );
        assert_eq!(f.listener.errors().len(), 1);
        assert!(!f.checkout.is_processing());
        assert!(!f.checkout.render().unwrap().disabled);
    }

    #[tokio::test]
    async fn test_validation_failure_records_error_without_callback() {
        let f = fixture(MockGateway::succeeding("txn"), 100.0);

        let err = f.checkout.pay().await.unwrap_err();

        assert!(matches!(err, CheckoutError::Validation(_)));
        assert_eq!(f.checkout.last_error().as_deref(), Some("Cardholder name is required"));
        assert!(f.listener.errors().is_empty());
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_external_processing_disables_all_methods() {
        let f = fixture(MockGateway::succeeding("txn"), 100.0);
        fill_card(&f.card);

        let guard = f.checkout.begin_external_processing().unwrap();

        assert!(f.checkout.is_processing());
        assert!(f.card.render().disabled);
        assert!(f.qr.render().disabled);
        assert!(matches!(
            f.checkout.select(MethodKind::PromptPay),
            Err(CheckoutError::Busy)
        ));
        assert!(matches!(f.checkout.pay().await, Err(CheckoutError::Busy)));
        assert!(matches!(
            f.checkout.begin_external_processing(),
            Err(CheckoutError::Busy)
        ));

        drop(guard);
        assert!(f.checkout.select(MethodKind::PromptPay).is_ok());
        assert_eq!(f.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_one_submission_across_methods() {
        let f = fixture(MockGateway::succeeding("txn").held(), 100.0);
        fill_card(&f.card);
        f.qr.generate().unwrap();

        let paying = tokio::spawn({
            let checkout = f.checkout.clone();
            async move { checkout.pay().await }
        });
        f.gateway.wait_for_calls(1).await;

        assert!(matches!(f.checkout.pay().await, Err(CheckoutError::Busy)));
        assert!(matches!(f.qr.submit().await, Err(CheckoutError::Busy)));
        assert!(matches!(
            f.checkout.select(MethodKind::PromptPay),
            Err(CheckoutError::Busy)
        ));

        f.gateway.release();
        paying.await.unwrap().unwrap();
        assert_eq!(f.gateway.call_count(), 1);
        assert!(f.checkout.can_fulfil());
    }

    #[tokio::test]
    async fn test_paid_order_refuses_second_charge() {
        let f = fixture(MockGateway::succeeding("txn_card"), 500.0);
        fill_card(&f.card);
        f.qr.generate().unwrap();

        let paid = f.checkout.pay().await.unwrap();
        assert!(f.checkout.can_fulfil());

        // Straight to the QR widget, bypassing pay()
        let err = f.qr.submit().await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidState { phase: "order-settled", .. }
        ));
        assert!(matches!(
            f.qr.generate(),
            Err(CheckoutError::InvalidState { .. })
        ));
        assert!(f.qr.render().disabled);

        assert_eq!(f.gateway.call_count(), 1);
        assert_eq!(f.checkout.payment_state(), OrderPaymentState::Paid(paid));
        assert!(f.checkout.can_fulfil());
        assert_eq!(f.listener.successes().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_order_refuses_card_charge() {
        let f = fixture(MockGateway::succeeding("txn_qr"), 500.0);
        fill_card(&f.card);
        f.qr.generate().unwrap();
        f.qr.submit().await.unwrap();

        let err = f.card.submit().await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidState { .. }));
        assert_eq!(f.gateway.call_count(), 1);
        assert_eq!(f.checkout.payment_state().as_str(), "awaiting-confirmation");
    }

    #[test]
    fn test_late_result_never_downgrades_paid_order() {
        let tracker = OrderTracker::new();
        let completed = PaymentResult {
            method: MethodKind::Card,
            transaction_id: "txn_card".to_string(),
            status: PaymentStatus::Completed,
            reference: None,
            received_at: chrono::Utc::now(),
        };
        let pending = PaymentResult {
            method: MethodKind::PromptPay,
            transaction_id: "txn_qr".to_string(),
            status: PaymentStatus::PendingVerification,
            reference: Some("ref".to_string()),
            received_at: chrono::Utc::now(),
        };

        tracker.on_success(&completed);
        tracker.on_success(&pending);

        assert_eq!(
            lock(&tracker.ledger).payment,
            OrderPaymentState::Paid(completed)
        );
        assert!(tracker.gate.is_closed());
    }

    #[test]
    fn test_select_unregistered_method() {
        let gateway = Arc::new(MockGateway::succeeding("txn"));
        let mut checkout = CheckoutOrchestrator::new(Amount::new(10.0).unwrap(), Currency::USD);
        checkout.register(Arc::new(CardWidget::new(gateway, checkout.props())));

        assert!(matches!(
            checkout.select(MethodKind::PromptPay),
            Err(CheckoutError::Configuration(_))
        ));
        assert_eq!(checkout.active_kind(), Some(MethodKind::Card));
    }

    #[test]
    fn test_no_methods_registered() {
        let checkout = CheckoutOrchestrator::new(Amount::new(10.0).unwrap(), Currency::USD);
        assert!(matches!(checkout.render(), Err(CheckoutError::Configuration(_))));
    }
}

//! # QR-transfer (PromptPay) Payment Method
//!
//! Shows a display-only payment string for a fixed receiver, then lets the
//! shopper assert they have paid. The backend answers with a
//! `pending-verification` result; the transfer itself is confirmed out of
//! band.
//!
//! ```text
//!   Idle ──generate──▶ QrGenerated ──confirm──▶ Confirming ──ok──▶ Verified
//!    ▲                   │  ▲  │                    │
//!    └──────back─────────┘  │  └─regenerate─┐       │
//!                           └───────────────┴─error─┘
//! ```
//!
//! The validity window is advisory: render reports the remaining time and
//! an `expired` flag, confirmation is still accepted afterwards.

use crate::client::SharedGateway;
use crate::config::SettlementConfig;
use crate::flight::{lock, InFlight};
use async_trait::async_trait;
use checkout_core::{
    Amount, CheckoutError, CheckoutResult, Field, FieldView, MethodKind, MethodPayload,
    PaymentMethod, PaymentRequest, PaymentResult, ValidationError, WidgetProps, WidgetView,
};
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Build the display-only payment string for a receiver and amount
pub fn payment_string(receiver_id: &str, amount: Amount) -> String {
    format!("promptpay://{}?amount={:.2}", receiver_id, amount.value())
}

/// A generated payment string and its validity window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrSession {
    pub payment_string: String,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QrSession {
    /// Whole seconds left at `now`, floored at zero
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Phases of the QR state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrPhase {
    Idle,
    QrGenerated,
    Confirming,
    Verified,
}

impl QrPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            QrPhase::Idle => "idle",
            QrPhase::QrGenerated => "qr-generated",
            QrPhase::Confirming => "confirming",
            QrPhase::Verified => "verified",
        }
    }
}

struct QrState {
    phase: QrPhase,
    session: Option<QrSession>,
    error: Option<String>,
    result: Option<PaymentResult>,
    /// Client reference of the latest confirmation attempt
    last_reference: Option<String>,
}

impl Default for QrState {
    fn default() -> Self {
        Self {
            phase: QrPhase::Idle,
            session: None,
            error: None,
            result: None,
            last_reference: None,
        }
    }
}

/// QR-transfer checkout widget
pub struct QrWidget {
    gateway: SharedGateway,
    props: WidgetProps,
    receiver_id: String,
    validity: chrono::Duration,
    timeout: Duration,
    state: Mutex<QrState>,
}

impl QrWidget {
    pub fn new(gateway: SharedGateway, props: WidgetProps, receiver_id: impl Into<String>) -> Self {
        Self {
            gateway,
            props,
            receiver_id: receiver_id.into(),
            validity: chrono::Duration::minutes(10),
            timeout: Duration::from_secs(30),
            state: Mutex::new(QrState::default()),
        }
    }

    /// Widget using the configured receiver, validity window and timeout
    pub fn from_config(gateway: SharedGateway, props: WidgetProps, config: &SettlementConfig) -> Self {
        Self::new(gateway, props, config.promptpay_receiver_id.clone())
            .with_validity(config.qr_validity())
            .with_timeout(config.timeout())
    }

    pub fn with_validity(mut self, validity: chrono::Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    pub fn current_phase(&self) -> QrPhase {
        lock(&self.state).phase
    }

    pub fn session(&self) -> Option<QrSession> {
        lock(&self.state).session.clone()
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn result(&self) -> Option<PaymentResult> {
        lock(&self.state).result.clone()
    }

    pub fn last_reference(&self) -> Option<String> {
        lock(&self.state).last_reference.clone()
    }

    /// Receiver id must be a phone number or tax id
    pub fn validate(&self) -> Result<(), ValidationError> {
        let receiver = &self.receiver_id;
        if receiver.len() < 10
            || receiver.len() > 15
            || !receiver.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::new(
                Field::ReceiverId,
                "PromptPay receiver must be a phone number or tax id",
            ));
        }
        Ok(())
    }

    /// Confirmation request carrying a fresh client reference
    pub fn tokenize(&self) -> PaymentRequest {
        PaymentRequest::promptpay(self.props.amount, self.receiver_id.as_str())
    }

    /// Generate (or regenerate) the payment string. No network call.
    pub fn generate(&self) -> CheckoutResult<String> {
        self.generate_at(Utc::now())
    }

    pub(crate) fn generate_at(&self, now: DateTime<Utc>) -> CheckoutResult<String> {
        if self.props.is_processing() {
            return Err(CheckoutError::Busy);
        }
        if self.props.is_order_closed() {
            return Err(CheckoutError::InvalidState {
                action: "generate a QR code",
                phase: "order-settled",
            });
        }

        let mut state = lock(&self.state);
        match state.phase {
            QrPhase::Idle | QrPhase::QrGenerated => {}
            QrPhase::Confirming => return Err(CheckoutError::Busy),
            QrPhase::Verified => {
                return Err(CheckoutError::InvalidState {
                    action: "generate a QR code",
                    phase: QrPhase::Verified.as_str(),
                })
            }
        }

        let session = QrSession {
            payment_string: payment_string(&self.receiver_id, self.props.amount),
            generated_at: now,
            expires_at: now
                .checked_add_signed(self.validity)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let generated = session.payment_string.clone();

        debug!("QR payment string generated, expires at {}", session.expires_at);
        state.session = Some(session);
        state.phase = QrPhase::QrGenerated;
        state.error = None;

        Ok(generated)
    }

    /// Discard the payment string and return to Idle
    pub fn back(&self) -> CheckoutResult<()> {
        if self.props.is_processing() {
            return Err(CheckoutError::Busy);
        }

        let mut state = lock(&self.state);
        match state.phase {
            QrPhase::Idle | QrPhase::QrGenerated => {
                state.phase = QrPhase::Idle;
                state.session = None;
                state.error = None;
                Ok(())
            }
            QrPhase::Confirming => Err(CheckoutError::Busy),
            QrPhase::Verified => Err(CheckoutError::InvalidState {
                action: "go back",
                phase: QrPhase::Verified.as_str(),
            }),
        }
    }

    /// Render against an explicit clock
    pub fn render_at(&self, now: DateTime<Utc>) -> WidgetView {
        let state = lock(&self.state);
        let phase = state.phase;
        let mut view = WidgetView::new(MethodKind::PromptPay, phase.as_str(), &self.props);

        view.disabled = view.disabled || matches!(phase, QrPhase::Confirming | QrPhase::Verified);
        view.error = state.error.clone();
        view.fields = vec![FieldView {
            field: Field::ReceiverId,
            label: "PromptPay ID",
            value: self.receiver_id.clone(),
            placeholder: "",
            masked: false,
        }];

        if let Some(session) = state.session.as_ref().filter(|_| phase != QrPhase::Idle) {
            view.payment_string = Some(session.payment_string.clone());
            view.expires_in_secs = Some(session.remaining_secs(now));
            view.expired = session.is_expired(now);
        }

        view.primary_action = match phase {
            QrPhase::Idle => "Generate QR Code".to_string(),
            QrPhase::QrGenerated => "I have paid".to_string(),
            QrPhase::Confirming => "Confirming...".to_string(),
            QrPhase::Verified => "Payment submitted".to_string(),
        };

        if phase == QrPhase::QrGenerated {
            view.secondary_action = Some("Back".to_string());
        }

        view.notice = match phase {
            QrPhase::Idle => Some(format!("Scan to pay {}", view.amount_label)),
            QrPhase::QrGenerated if view.expired => {
                Some("This QR code has expired. Generate a new one before paying.".to_string())
            }
            QrPhase::Verified => {
                Some("Payment submitted. We will confirm it once the transfer arrives.".to_string())
            }
            _ => None,
        };

        view
    }
}

#[async_trait]
impl PaymentMethod for QrWidget {
    fn kind(&self) -> MethodKind {
        MethodKind::PromptPay
    }

    fn phase(&self) -> &'static str {
        self.current_phase().as_str()
    }

    fn render(&self) -> WidgetView {
        self.render_at(Utc::now())
    }

    #[instrument(skip(self), fields(method = "promptpay"))]
    async fn submit(&self) -> CheckoutResult<PaymentResult> {
        let (flight, request, reference) = {
            let mut state = lock(&self.state);
            match state.phase {
                QrPhase::QrGenerated => {}
                QrPhase::Confirming => return Err(CheckoutError::Busy),
                phase => {
                    return Err(CheckoutError::InvalidState {
                        action: "confirm payment",
                        phase: phase.as_str(),
                    })
                }
            }

            if let Err(err) = self.validate() {
                state.error = Some(err.reason.clone());
                return Err(err.into());
            }

            if state.session.as_ref().is_some_and(|s| s.is_expired(Utc::now())) {
                warn!("Confirming payment for an expired QR code");
            }

            let busy = self.props.processing.try_acquire().ok_or(CheckoutError::Busy)?;
            if self.props.is_order_closed() {
                warn!("Refusing PromptPay confirmation: order already settled");
                return Err(CheckoutError::InvalidState {
                    action: "confirm payment",
                    phase: "order-settled",
                });
            }

            let request = self.tokenize();
            let reference = match &request.payload {
                MethodPayload::PromptPay(charge) => charge.client_reference.clone(),
                MethodPayload::Card(_) => request.idempotency_key.clone(),
            };

            state.phase = QrPhase::Confirming;
            state.error = None;
            state.last_reference = Some(reference.clone());

            let flight = InFlight::new(&self.state, busy, |s: &mut QrState| {
                s.phase = QrPhase::QrGenerated;
                s.error = Some("Payment confirmation was cancelled".to_string());
            });
            (flight, request, reference)
        };

        let outcome = match tokio::time::timeout(self.timeout, self.gateway.settle(&request)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(CheckoutError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(mut receipt) => {
                receipt.reference.get_or_insert(reference);
                let result = PaymentResult::from_receipt(MethodKind::PromptPay, receipt);
                {
                    let mut state = lock(&self.state);
                    state.phase = QrPhase::Verified;
                    state.result = Some(result.clone());
                }

                info!(
                    "PromptPay payment submitted for verification: {}",
                    result.transaction_id
                );
                self.props.listener.on_success(&result);
                flight.complete();
                Ok(result)
            }
            Err(err) => {
                let message = err.user_message();
                {
                    let mut state = lock(&self.state);
                    state.phase = QrPhase::QrGenerated;
                    state.error = Some(message.clone());
                }

                warn!("PromptPay confirmation failed: {}", err);
                self.props.listener.on_error(MethodKind::PromptPay, &message);
                flight.complete();
                Err(err)
            }
        }
    }

    fn reset(&self) {
        let mut state = lock(&self.state);
        if state.phase == QrPhase::Confirming {
            return;
        }
        *state = QrState::default();
    }

    fn is_settled(&self) -> bool {
        self.current_phase() == QrPhase::Verified
    }
}

//! # Card-like Payment Method
//!
//! Collects cardholder name, number, expiry and CVV, validates them
//! locally, derives a single-use token and sends only
//! `{amount, token, cardholderName}` to the settlement endpoint.
//!
//! ```text
//!   Editing ──submit──▶ Submitting ──ok──▶ Success
//!      ▲                    │
//!      └──────error─────────┘   (Failed: back to Editing with a message)
//! ```

use crate::client::SharedGateway;
use crate::flight::{lock, InFlight};
use crate::token::{CardToken, CardTokenizer};
use async_trait::async_trait;
use checkout_core::{
    Amount, CheckoutError, CheckoutResult, Field, FieldView, MethodKind, PaymentMethod, PaymentRequest,
    PaymentResult, ValidationError, WidgetProps, WidgetView,
};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

const CARD_DIGITS: usize = 16;
const EXPIRY_DIGITS: usize = 4;
const CVV_MAX_DIGITS: usize = 4;

/// Group card digits into fours: `"4242424242424242"` -> `"4242 4242 4242 4242"`.
/// Non-digits are dropped and at most 16 digits are kept.
pub fn format_card_number(raw: &str) -> String {
    let digits: Vec<char> = raw
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(CARD_DIGITS)
        .collect();

    digits
        .chunks(4)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Insert `/` after the month: `"1229"` -> `"12/29"`.
/// Non-digits are dropped and at most 4 digits are kept.
pub fn format_expiry(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(EXPIRY_DIGITS)
        .collect();

    if digits.len() > 2 {
        format!("{}/{}", &digits[..2], &digits[2..])
    } else {
        digits
    }
}

/// Keep at most 4 digits
pub fn format_cvv(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit())
        .take(CVV_MAX_DIGITS)
        .collect()
}

/// Strip spaces and dashes from a card number
fn strip_separators(number: &str) -> String {
    number.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

/// Hide all but the last four digits, keeping the grouping:
/// `"4242 4242 4242 4242"` -> `"•••• •••• •••• 4242"`.
pub fn mask_card_number(formatted: &str) -> String {
    let total = formatted.chars().filter(char::is_ascii_digit).count();
    let hidden = total.saturating_sub(4);
    let mut seen = 0;

    formatted
        .chars()
        .map(|c| {
            if !c.is_ascii_digit() {
                return c;
            }
            seen += 1;
            if seen <= hidden {
                '•'
            } else {
                c
            }
        })
        .collect()
}

/// Card charges are sent in whole units, so the rounded amount must be positive
fn check_charge_amount(amount: Amount) -> Result<(), ValidationError> {
    if amount.rounded() < 1 {
        return Err(ValidationError::new(
            Field::Amount,
            "Amount must be at least 1",
        ));
    }
    Ok(())
}

/// Local card form state. Sensitive fields are zeroed on drop.
#[derive(Default, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CardForm {
    pub cardholder_name: String,
    /// Display-formatted number; never transmitted
    pub card_number: String,
    /// `MM/YY`
    pub expiry: String,
    /// Never transmitted
    pub cvv: String,
}

impl CardForm {
    pub fn new(
        cardholder_name: impl Into<String>,
        card_number: &str,
        expiry: &str,
        cvv: &str,
    ) -> Self {
        Self {
            cardholder_name: cardholder_name.into(),
            card_number: format_card_number(card_number),
            expiry: format_expiry(expiry),
            cvv: format_cvv(cvv),
        }
    }

    /// Local, synchronous validation; first failing field wins
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cardholder_name.trim().is_empty() {
            return Err(ValidationError::new(
                Field::CardholderName,
                "Cardholder name is required",
            ));
        }

        let mut digits = strip_separators(&self.card_number);
        let well_formed =
            digits.len() == CARD_DIGITS && digits.chars().all(|c| c.is_ascii_digit());
        digits.zeroize();
        if !well_formed {
            return Err(ValidationError::new(
                Field::CardNumber,
                "Card number must be 16 digits",
            ));
        }

        if !is_expiry_shaped(&self.expiry) {
            return Err(ValidationError::new(
                Field::Expiry,
                "Expiry date must be in MM/YY format",
            ));
        }

        let month: u8 = self.expiry[..2].parse().unwrap_or(0);
        if !(1..=12).contains(&month) {
            return Err(ValidationError::new(
                Field::Expiry,
                "Expiry month must be between 01 and 12",
            ));
        }

        let cvv_len = self.cvv.len();
        if !(3..=CVV_MAX_DIGITS).contains(&cvv_len) || !self.cvv.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ValidationError::new(Field::Cvv, "CVV must be 3 or 4 digits"));
        }

        Ok(())
    }

    /// Derive the opaque token for this form under a tokenizer's salt
    pub fn tokenize(&self, tokenizer: &CardTokenizer) -> CardToken {
        let mut digits = strip_separators(&self.card_number);
        let token = tokenizer.tokenize(&digits, &self.expiry, &self.cvv);
        digits.zeroize();
        token
    }

    /// Zero and clear number, expiry and CVV
    pub fn wipe_sensitive(&mut self) {
        self.card_number.zeroize();
        self.expiry.zeroize();
        self.cvv.zeroize();
    }

    /// Last four digits, for display after the number is gone
    pub fn last4(&self) -> Option<String> {
        let mut digits = strip_separators(&self.card_number);
        let last4 = (digits.len() >= 4).then(|| digits[digits.len() - 4..].to_string());
        digits.zeroize();
        last4
    }
}

/// `MM/YY`: two digits, a slash, two digits
fn is_expiry_shaped(expiry: &str) -> bool {
    let bytes = expiry.as_bytes();
    bytes.len() == 5
        && bytes[2] == b'/'
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[3..].iter().all(u8::is_ascii_digit)
}

/// Phases of the card state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    Editing,
    Submitting,
    Success,
}

impl CardPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardPhase::Editing => "editing",
            CardPhase::Submitting => "submitting",
            CardPhase::Success => "success",
        }
    }
}

struct CardState {
    phase: CardPhase,
    form: CardForm,
    error: Option<String>,
    result: Option<PaymentResult>,
    last4: Option<String>,
}

impl Default for CardState {
    fn default() -> Self {
        Self {
            phase: CardPhase::Editing,
            form: CardForm::default(),
            error: None,
            result: None,
            last4: None,
        }
    }
}

/// Card-like checkout widget
pub struct CardWidget {
    gateway: SharedGateway,
    props: WidgetProps,
    timeout: Duration,
    state: Mutex<CardState>,
}

impl CardWidget {
    pub fn new(gateway: SharedGateway, props: WidgetProps) -> Self {
        Self {
            gateway,
            props,
            timeout: Duration::from_secs(30),
            state: Mutex::new(CardState::default()),
        }
    }

    /// Builder: bound for one settlement call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn current_phase(&self) -> CardPhase {
        lock(&self.state).phase
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn result(&self) -> Option<PaymentResult> {
        lock(&self.state).result.clone()
    }

    /// Copy of the current form state
    pub fn form(&self) -> CardForm {
        lock(&self.state).form.clone()
    }

    pub fn set_cardholder_name(&self, value: &str) -> CheckoutResult<()> {
        self.edit(|form| form.cardholder_name = value.to_string())
    }

    pub fn set_card_number(&self, value: &str) -> CheckoutResult<()> {
        self.edit(|form| form.card_number = format_card_number(value))
    }

    pub fn set_expiry(&self, value: &str) -> CheckoutResult<()> {
        self.edit(|form| form.expiry = format_expiry(value))
    }

    pub fn set_cvv(&self, value: &str) -> CheckoutResult<()> {
        self.edit(|form| form.cvv = format_cvv(value))
    }

    /// Apply an input change; only while editing and not processing
    fn edit(&self, apply: impl FnOnce(&mut CardForm)) -> CheckoutResult<()> {
        if self.props.is_processing() {
            return Err(CheckoutError::Busy);
        }

        let mut state = lock(&self.state);
        match state.phase {
            CardPhase::Editing => {
                apply(&mut state.form);
                Ok(())
            }
            phase => Err(CheckoutError::InvalidState {
                action: "edit card details",
                phase: phase.as_str(),
            }),
        }
    }

    /// Validate the current form and the charge amount without submitting
    pub fn validate(&self) -> Result<(), ValidationError> {
        lock(&self.state).form.validate()?;
        check_charge_amount(self.props.amount)
    }
}

#[async_trait]
impl PaymentMethod for CardWidget {
    fn kind(&self) -> MethodKind {
        MethodKind::Card
    }

    fn phase(&self) -> &'static str {
        self.current_phase().as_str()
    }

    fn render(&self) -> WidgetView {
        let state = lock(&self.state);
        let phase = state.phase;
        let mut view = WidgetView::new(MethodKind::Card, phase.as_str(), &self.props);

        view.disabled = view.disabled || phase != CardPhase::Editing;
        view.error = state.error.clone();
        view.fields = vec![
            FieldView {
                field: Field::CardholderName,
                label: "Cardholder Name",
                value: state.form.cardholder_name.clone(),
                placeholder: "Name on card",
                masked: false,
            },
            FieldView {
                field: Field::CardNumber,
                label: "Card Number",
                value: mask_card_number(&state.form.card_number),
                placeholder: "1234 5678 9012 3456",
                masked: false,
            },
            FieldView {
                field: Field::Expiry,
                label: "Expiry Date",
                value: state.form.expiry.clone(),
                placeholder: "MM/YY",
                masked: false,
            },
            FieldView {
                field: Field::Cvv,
                label: "CVV",
                value: "•".repeat(state.form.cvv.len()),
                placeholder: "123",
                masked: true,
            },
        ];

        view.primary_action = match phase {
            CardPhase::Editing if self.props.is_processing() => "Processing...".to_string(),
            CardPhase::Editing => format!("Pay {}", view.amount_label),
            CardPhase::Submitting => "Processing...".to_string(),
            CardPhase::Success => "Paid".to_string(),
        };

        if phase == CardPhase::Success {
            view.notice = Some(match &state.last4 {
                Some(last4) => format!("Payment successful with card ending in {}", last4),
                None => "Payment successful".to_string(),
            });
        }

        view
    }

    #[instrument(skip(self), fields(method = "card-like"))]
    async fn submit(&self) -> CheckoutResult<PaymentResult> {
        let (flight, request) = {
            let mut state = lock(&self.state);
            match state.phase {
                CardPhase::Editing => {}
                CardPhase::Submitting => return Err(CheckoutError::Busy),
                CardPhase::Success => {
                    return Err(CheckoutError::InvalidState {
                        action: "submit",
                        phase: CardPhase::Success.as_str(),
                    })
                }
            }

            let valid = state
                .form
                .validate()
                .and_then(|_| check_charge_amount(self.props.amount));
            if let Err(err) = valid {
                debug!("Card validation failed on {}", err.field);
                state.error = Some(err.reason.clone());
                return Err(err.into());
            }

            let busy = self.props.processing.try_acquire().ok_or(CheckoutError::Busy)?;
            if self.props.is_order_closed() {
                warn!("Refusing card submission: order already settled");
                return Err(CheckoutError::InvalidState {
                    action: "submit",
                    phase: "order-settled",
                });
            }

            let token = state.form.tokenize(&CardTokenizer::new());
            let request = PaymentRequest::card(
                self.props.amount,
                token.into_string(),
                state.form.cardholder_name.trim(),
            );

            state.phase = CardPhase::Submitting;
            state.error = None;

            let flight = InFlight::new(&self.state, busy, |s: &mut CardState| {
                s.phase = CardPhase::Editing;
                s.error = Some("Payment was cancelled".to_string());
            });
            (flight, request)
        };

        let outcome = match tokio::time::timeout(self.timeout, self.gateway.settle(&request)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(CheckoutError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(receipt) => {
                let result = PaymentResult::from_receipt(MethodKind::Card, receipt);
                {
                    let mut state = lock(&self.state);
                    state.last4 = state.form.last4();
                    state.form.wipe_sensitive();
                    state.phase = CardPhase::Success;
                    state.result = Some(result.clone());
                }

                info!("Card payment completed: {}", result.transaction_id);
                // Listener runs before the busy flag is released
                self.props.listener.on_success(&result);
                flight.complete();
                Ok(result)
            }
            Err(err) => {
                let message = err.user_message();
                {
                    let mut state = lock(&self.state);
                    state.phase = CardPhase::Editing;
                    state.error = Some(message.clone());
                }

                warn!("Card payment failed: {}", err);
                self.props.listener.on_error(MethodKind::Card, &message);
                flight.complete();
                Err(err)
            }
        }
    }

    fn reset(&self) {
        let mut state = lock(&self.state);
        if state.phase == CardPhase::Submitting {
            return;
        }
        *state = CardState::default();
    }

    fn is_settled(&self) -> bool {
        self.current_phase() == CardPhase::Success
    }
}

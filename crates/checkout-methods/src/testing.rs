//! Test doubles shared by the widget and orchestrator tests.

use crate::client::SettlementGateway;
use async_trait::async_trait;
use checkout_core::{
    Amount, CheckoutError, CheckoutResult, Currency, MethodKind, MethodPayload, PaymentListener,
    PaymentRequest, PaymentResult, SettlementReceipt, WidgetProps,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

enum Reply {
    Receipt(String),
    Reject { status: u16, message: String },
}

/// In-memory settlement gateway recording every request
pub(crate) struct MockGateway {
    reply: Mutex<Reply>,
    calls: Mutex<Vec<PaymentRequest>>,
    hold: AtomicBool,
    gate: Semaphore,
}

impl MockGateway {
    pub(crate) fn succeeding(transaction_id: &str) -> Self {
        Self::with_reply(Reply::Receipt(transaction_id.to_string()))
    }

    pub(crate) fn failing(status: u16, message: &str) -> Self {
        Self::with_reply(Reply::Reject {
            status,
            message: message.to_string(),
        })
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: Mutex::new(Vec::new()),
            hold: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    /// Calls park until `release` is called
    pub(crate) fn held(self) -> Self {
        self.hold.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.gate.add_permits(64);
    }

    pub(crate) fn succeed_with(&self, transaction_id: &str) {
        *self.reply.lock().unwrap() = Reply::Receipt(transaction_id.to_string());
    }

    pub(crate) fn calls(&self) -> Vec<PaymentRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        while self.call_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl SettlementGateway for MockGateway {
    async fn settle(&self, request: &PaymentRequest) -> CheckoutResult<SettlementReceipt> {
        self.calls.lock().unwrap().push(request.clone());

        if self.hold.load(Ordering::SeqCst) {
            let _permit = self.gate.acquire().await.unwrap();
        }

        let reference = match &request.payload {
            MethodPayload::PromptPay(charge) => Some(charge.client_reference.clone()),
            MethodPayload::Card(_) => None,
        };

        match &*self.reply.lock().unwrap() {
            Reply::Receipt(transaction_id) => Ok(SettlementReceipt {
                transaction_id: transaction_id.clone(),
                reference,
            }),
            Reply::Reject { status, message } => Err(CheckoutError::Business {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

/// Listener recording every callback
#[derive(Default)]
pub(crate) struct RecordingListener {
    successes: Mutex<Vec<PaymentResult>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub(crate) fn successes(&self) -> Vec<PaymentResult> {
        self.successes.lock().unwrap().clone()
    }

    pub(crate) fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl PaymentListener for RecordingListener {
    fn on_success(&self, result: &PaymentResult) {
        self.successes.lock().unwrap().push(result.clone());
    }

    fn on_error(&self, _method: MethodKind, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

pub(crate) fn props(amount: f64, listener: Arc<RecordingListener>) -> WidgetProps {
    WidgetProps::new(Amount::new(amount).unwrap(), Currency::THB).with_listener(listener)
}

//! # Payment Types
//!
//! Request, result and wire-envelope types shared by the payment widgets,
//! the settlement client and the settlement sandbox.

use crate::amount::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Payment method identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// Card-style method (number, expiry, CVV collected locally, token sent)
    #[serde(rename = "card-like")]
    Card,
    /// QR-transfer method (PromptPay-style)
    #[serde(rename = "promptpay")]
    PromptPay,
}

impl MethodKind {
    /// Label used in results and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Card => "card-like",
            MethodKind::PromptPay => "promptpay",
        }
    }

    /// Path segment of the settlement endpoint (`/payments/{segment}`)
    pub fn endpoint_segment(&self) -> &'static str {
        match self {
            MethodKind::Card => "stripe",
            MethodKind::PromptPay => "promptpay",
        }
    }

    /// Resolve a settlement path segment back to a method
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "stripe" => Some(MethodKind::Card),
            "promptpay" => Some(MethodKind::PromptPay),
            _ => None,
        }
    }

    /// Status a successful settlement call maps to.
    /// QR transfers are only pending until funds are confirmed out of band.
    pub fn success_status(&self) -> PaymentStatus {
        match self {
            MethodKind::Card => PaymentStatus::Completed,
            MethodKind::PromptPay => PaymentStatus::PendingVerification,
        }
    }

    pub fn all() -> [MethodKind; 2] {
        [MethodKind::Card, MethodKind::PromptPay]
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a payment as reported to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    /// Settled; fulfilment may proceed
    Completed,
    /// Accepted but not yet confirmed settled; not final
    PendingVerification,
    /// Rejected
    Failed,
}

impl PaymentStatus {
    /// Whether the order may be fulfilled on this status
    pub fn is_final(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::PendingVerification
    }
}

/// Card charge body. Carries only the derived token, never card data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardCharge {
    /// Amount rounded to the nearest whole unit
    pub amount: i64,
    /// Single-use opaque token
    pub token: String,
    pub cardholder_name: String,
}

/// QR-transfer confirmation body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPayCharge {
    pub amount: Amount,
    pub receiver_id: String,
    pub client_reference: String,
}

/// Opaque method-specific payload; serializes to the wire body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MethodPayload {
    Card(CardCharge),
    PromptPay(PromptPayCharge),
}

/// A request to the settlement endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    /// Target method
    pub method: MethodKind,

    /// Checkout amount as supplied by the orchestrator
    pub amount: Amount,

    /// Method-specific body
    pub payload: MethodPayload,

    /// Client-generated reference the backend may de-duplicate on
    pub idempotency_key: String,
}

impl PaymentRequest {
    /// Build a card request with a fresh idempotency reference
    pub fn card(amount: Amount, token: impl Into<String>, cardholder_name: impl Into<String>) -> Self {
        Self {
            method: MethodKind::Card,
            amount,
            payload: MethodPayload::Card(CardCharge {
                amount: amount.rounded(),
                token: token.into(),
                cardholder_name: cardholder_name.into(),
            }),
            idempotency_key: new_reference(),
        }
    }

    /// Build a QR confirmation request. The client reference doubles as the
    /// idempotency reference.
    pub fn promptpay(amount: Amount, receiver_id: impl Into<String>) -> Self {
        let reference = new_reference();
        Self {
            method: MethodKind::PromptPay,
            amount,
            payload: MethodPayload::PromptPay(PromptPayCharge {
                amount,
                receiver_id: receiver_id.into(),
                client_reference: reference.clone(),
            }),
            idempotency_key: reference,
        }
    }

    /// The JSON body sent to the backend
    pub fn body(&self) -> serde_json::Value {
        serde_json::to_value(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// Generate a client reference (UUID v4, cryptographically random)
pub fn new_reference() -> String {
    Uuid::new_v4().to_string()
}

/// Outcome of a settled payment attempt, built from the backend response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub method: MethodKind,

    /// Backend-assigned transaction id
    pub transaction_id: String,

    pub status: PaymentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    pub received_at: DateTime<Utc>,
}

impl PaymentResult {
    /// Build a result from a settlement receipt
    pub fn from_receipt(method: MethodKind, receipt: SettlementReceipt) -> Self {
        Self {
            method,
            transaction_id: receipt.transaction_id,
            status: method.success_status(),
            reference: receipt.reference,
            received_at: Utc::now(),
        }
    }

    /// Whether fulfilment may proceed
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// `data` part of a successful settlement response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Settlement response envelope
///
/// Success: `{ "success": true, "data": { "transactionId": ..., "reference": ... } }`
/// Failure: `{ "success": false, "message": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SettlementReceipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SettlementEnvelope {
    pub fn ok(receipt: SettlementReceipt) -> Self {
        Self {
            success: true,
            data: Some(receipt),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

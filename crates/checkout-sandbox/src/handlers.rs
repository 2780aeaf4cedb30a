//! # Request Handlers
//!
//! Axum request handlers for the sandbox settlement endpoint.
//! Every reply uses the settlement envelope:
//! `{ success, data: { transactionId, reference? } }` or `{ success: false, message }`.

use crate::state::{body_hash, AppState, StoredReply, Transaction};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use checkout_core::{
    CardCharge, MethodKind, PromptPayCharge, SettlementEnvelope, SettlementReceipt,
};
use checkout_methods::CardToken;
use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Message for a missing or wrong bearer token
pub const UNAUTHORIZED_MESSAGE: &str = "Not authorized, token failed";

/// Message for an idempotency key sent again with another body
pub const KEY_REUSED_MESSAGE: &str = "Idempotency key reused with a different request";

/// Status plus envelope, the shape of every settlement reply
pub type SettlementReply = (StatusCode, Json<SettlementEnvelope>);

fn reject(status: StatusCode, message: impl Into<String>) -> SettlementReply {
    (status, Json(SettlementEnvelope::failure(message)))
}

fn accepted(receipt: SettlementReceipt) -> SettlementReply {
    (StatusCode::OK, Json(SettlementEnvelope::ok(receipt)))
}

fn new_transaction_id() -> String {
    format!("txn_{}", Uuid::new_v4().simple())
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "checkout-sandbox",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Whether the request carries the configured bearer token
fn is_authorized(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| !token.is_empty() && token == expected)
        .unwrap_or(false)
}

fn idempotency_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Settle a payment: `POST /api/payments/{method}`
#[instrument(skip(state, headers, body), fields(method = %method))]
pub async fn settle_payment(
    State(state): State<AppState>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> SettlementReply {
    if !is_authorized(&headers, &state.config.api_token) {
        warn!("Rejected settlement request without a valid bearer token");
        return reject(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE);
    }

    let Some(kind) = MethodKind::from_segment(&method) else {
        return reject(
            StatusCode::NOT_FOUND,
            format!("Unknown payment method: {}", method),
        );
    };

    let key = idempotency_key(&headers);
    let fingerprint = body_hash(&body);

    // Held across the whole request so a concurrent retry waits for the first reply
    let mut ledger = state.ledger.write().await;

    if let Some(stored) = key.as_deref().and_then(|k| ledger.replay(kind, k)) {
        if stored.body_hash != fingerprint {
            warn!("Idempotency key reused with a different request body");
            return reject(StatusCode::UNPROCESSABLE_ENTITY, KEY_REUSED_MESSAGE);
        }
        info!("Replaying stored reply for idempotency key");
        let status = StatusCode::from_u16(stored.status).unwrap_or(StatusCode::OK);
        return (status, Json(stored.envelope.clone()));
    }

    let outcome = match kind {
        MethodKind::Card => settle_card(&body),
        MethodKind::PromptPay => settle_promptpay(&body, &state.config.promptpay_receiver_id),
    };

    let (status, envelope) = match outcome {
        Ok(transaction) => {
            info!(
                "Accepted {} payment {} for {:.2}",
                transaction.method, transaction.transaction_id, transaction.amount
            );
            let receipt = SettlementReceipt {
                transaction_id: transaction.transaction_id.clone(),
                reference: transaction.reference.clone(),
            };
            ledger.record(transaction);
            accepted(receipt)
        }
        Err((status, envelope)) => {
            warn!("Rejected {} payment: {:?}", kind, envelope.message);
            (status, envelope)
        }
    };

    if let Some(key) = key {
        ledger.remember(
            kind,
            key,
            StoredReply {
                status: status.as_u16(),
                envelope: envelope.0.clone(),
                body_hash: fingerprint,
            },
        );
    }

    (status, envelope)
}

fn settle_card(body: &[u8]) -> Result<Transaction, SettlementReply> {
    let charge: CardCharge = serde_json::from_slice(body).map_err(|e| {
        reject(
            StatusCode::BAD_REQUEST,
            format!("Invalid card payment request: {}", e),
        )
    })?;

    if charge.amount <= 0 {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Amount must be greater than zero",
        ));
    }

    if !CardToken::is_well_formed(&charge.token) {
        return Err(reject(StatusCode::BAD_REQUEST, "Invalid card token"));
    }

    if charge.cardholder_name.trim().is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Cardholder name is required",
        ));
    }

    Ok(Transaction {
        transaction_id: new_transaction_id(),
        method: MethodKind::Card,
        amount: charge.amount as f64,
        status: MethodKind::Card.success_status(),
        reference: None,
        created_at: Utc::now(),
    })
}

fn settle_promptpay(body: &[u8], receiver_id: &str) -> Result<Transaction, SettlementReply> {
    let charge: PromptPayCharge = serde_json::from_slice(body).map_err(|e| {
        reject(
            StatusCode::BAD_REQUEST,
            format!("Invalid PromptPay payment request: {}", e),
        )
    })?;

    if charge.receiver_id != receiver_id {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Invalid PromptPay receiver",
        ));
    }

    if charge.client_reference.trim().is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Client reference is required",
        ));
    }

    Ok(Transaction {
        transaction_id: new_transaction_id(),
        method: MethodKind::PromptPay,
        amount: charge.amount.value(),
        status: MethodKind::PromptPay.success_status(),
        reference: Some(charge.client_reference),
        created_at: Utc::now(),
    })
}

/// Fallback for unknown routes
pub async fn not_found() -> SettlementReply {
    reject(StatusCode::NOT_FOUND, "Not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: header::HeaderName, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_check() {
        assert!(is_authorized(
            &headers_with(header::AUTHORIZATION, "Bearer secret"),
            "secret"
        ));
        assert!(!is_authorized(
            &headers_with(header::AUTHORIZATION, "Bearer other"),
            "secret"
        ));
        assert!(!is_authorized(
            &headers_with(header::AUTHORIZATION, "secret"),
            "secret"
        ));
        assert!(!is_authorized(&HeaderMap::new(), "secret"));
    }

    #[test]
    fn test_card_rejects_malformed_token() {
        let body = br#"{"amount":900,"token":"4242424242424242","cardholderName":"Jane"}"#;
        let (status, Json(envelope)) = settle_card(body).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope.message.as_deref(), Some("Invalid card token"));
    }

    #[test]
    fn test_card_rejects_non_positive_amount() {
        let body = br#"{"amount":0,"token":"tok_0123456789abcdef01234567","cardholderName":"Jane"}"#;
        let (status, _) = settle_card(body).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_card_accepts_well_formed_request() {
        let body =
            br#"{"amount":900,"token":"tok_0123456789abcdef01234567","cardholderName":"Jane"}"#;
        let transaction = settle_card(body).unwrap();
        assert!(transaction.transaction_id.starts_with("txn_"));
        assert_eq!(transaction.amount, 900.0);
    }

    #[test]
    fn test_promptpay_echoes_reference() {
        let body = br#"{"amount":500.0,"receiverId":"0812345678","clientReference":"ref-1"}"#;
        let transaction = settle_promptpay(body, "0812345678").unwrap();
        assert_eq!(transaction.reference.as_deref(), Some("ref-1"));

        let (status, _) = settle_promptpay(body, "0899999999").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_promptpay_rejects_non_positive_amount() {
        let body = br#"{"amount":-5,"receiverId":"0812345678","clientReference":"ref-1"}"#;
        let (status, _) = settle_promptpay(body, "0812345678").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

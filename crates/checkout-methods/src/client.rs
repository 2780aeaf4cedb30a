//! # Settlement Client
//!
//! HTTP client for the backend settlement endpoint
//! (`POST {base}/payments/{method}`, JSON, bearer-authenticated).
//! The backend is the only authority on payment state; this client relays
//! what it answers.

use crate::auth::{AuthTokenSource, StaticToken};
use crate::config::SettlementConfig;
use async_trait::async_trait;
use checkout_core::{
    CheckoutError, CheckoutResult, PaymentRequest, SettlementEnvelope, SettlementReceipt,
};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// The settlement boundary as seen by a widget
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Exchange a tokenized request for a backend receipt.
    async fn settle(&self, request: &PaymentRequest) -> CheckoutResult<SettlementReceipt>;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type SharedGateway = Arc<dyn SettlementGateway>;

/// reqwest-backed settlement client
pub struct HttpSettlementClient {
    config: SettlementConfig,
    client: Client,
    auth: Arc<dyn AuthTokenSource>,
}

impl HttpSettlementClient {
    /// Create a client with an injected token source
    pub fn new(config: SettlementConfig, auth: Arc<dyn AuthTokenSource>) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            client,
            auth,
        })
    }

    /// Create a client using the config's static token
    pub fn from_config(config: SettlementConfig) -> CheckoutResult<Self> {
        let auth = StaticToken::from_option(config.api_token.clone());
        Self::new(config, Arc::new(auth))
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    fn map_send_error(&self, err: reqwest::Error) -> CheckoutError {
        if err.is_timeout() {
            CheckoutError::Timeout(self.config.timeout_secs)
        } else {
            CheckoutError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl SettlementGateway for HttpSettlementClient {
    #[instrument(
        skip(self, request),
        fields(method = %request.method, idempotency_key = %request.idempotency_key)
    )]
    async fn settle(&self, request: &PaymentRequest) -> CheckoutResult<SettlementReceipt> {
        let token = self
            .auth
            .bearer_token()
            .ok_or(CheckoutError::Unauthenticated)?;

        let url = self.config.payment_url(request.method.endpoint_segment());
        debug!("Posting settlement request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&request.payload)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        let receipt = parse_settlement_response(status, &body)?;

        info!(
            "Settlement accepted: method={}, transaction_id={}",
            request.method, receipt.transaction_id
        );
        Ok(receipt)
    }
}

/// Turn a raw settlement response into a receipt or a business error
fn parse_settlement_response(status: StatusCode, body: &str) -> CheckoutResult<SettlementReceipt> {
    let envelope = serde_json::from_str::<SettlementEnvelope>(body);

    if !status.is_success() {
        error!("Settlement endpoint error: status={}", status);

        let message = match envelope {
            Ok(SettlementEnvelope {
                message: Some(message),
                ..
            }) => message,
            _ => format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("error")
            ),
        };

        return Err(CheckoutError::Business {
            status: status.as_u16(),
            message,
        });
    }

    let envelope = envelope.map_err(|e| {
        CheckoutError::Serialization(format!("Failed to parse settlement response: {}", e))
    })?;

    if !envelope.success {
        return Err(CheckoutError::Business {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| "Payment was not accepted".to_string()),
        });
    }

    envelope.data.ok_or_else(|| {
        CheckoutError::Serialization("Settlement response is missing data".to_string())
    })
}

//! # Application State
//!
//! Shared state for the sandbox settlement endpoint.
//! Holds the configuration and an in-memory ledger of settled payments,
//! keyed for idempotent replay.

use anyhow::Context;
use checkout_core::{MethodKind, PaymentStatus, SettlementEnvelope};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Idempotent replies kept before the oldest is evicted
const DEFAULT_REPLY_CAPACITY: usize = 1024;

/// Sandbox configuration
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Bearer token the sandbox accepts
    pub api_token: String,
    /// The only PromptPay receiver the sandbox accepts
    pub promptpay_receiver_id: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Idempotent replies kept in memory
    pub reply_capacity: usize,
}

impl SandboxConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            api_token: std::env::var("SANDBOX_API_TOKEN")
                .unwrap_or_else(|_| "sandbox-token".to_string()),
            promptpay_receiver_id: std::env::var("PROMPTPAY_RECEIVER_ID")
                .unwrap_or_else(|_| "0812345678".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            reply_capacity: std::env::var("IDEMPOTENCY_REPLY_CAPACITY")
                .ok()
                .and_then(|c| c.parse().ok())
                .filter(|c| *c > 0)
                .unwrap_or(DEFAULT_REPLY_CAPACITY),
        }
    }

    /// Explicit values (for testing)
    pub fn new(api_token: impl Into<String>, promptpay_receiver_id: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            api_token: api_token.into(),
            promptpay_receiver_id: promptpay_receiver_id.into(),
            environment: "test".to_string(),
            reply_capacity: DEFAULT_REPLY_CAPACITY,
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// A payment the sandbox accepted
#[derive(Debug, Clone)]
pub struct Transaction {
    pub transaction_id: String,
    pub method: MethodKind,
    pub amount: f64,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stored reply for an idempotency key
#[derive(Debug, Clone)]
pub struct StoredReply {
    pub status: u16,
    pub envelope: SettlementEnvelope,
    /// SHA-256 of the request body the reply was produced for
    pub body_hash: String,
}

/// Hex SHA-256 of a raw request body
pub fn body_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

type ReplyKey = (MethodKind, String);

/// In-memory settlement ledger
#[derive(Debug)]
pub struct Ledger {
    transactions: Vec<Transaction>,
    replies: HashMap<ReplyKey, StoredReply>,
    /// Insertion order of `replies`, oldest first
    reply_order: VecDeque<ReplyKey>,
    reply_capacity: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::with_reply_capacity(DEFAULT_REPLY_CAPACITY)
    }
}

impl Ledger {
    pub fn with_reply_capacity(reply_capacity: usize) -> Self {
        Self {
            transactions: Vec::new(),
            replies: HashMap::new(),
            reply_order: VecDeque::new(),
            reply_capacity: reply_capacity.max(1),
        }
    }

    pub fn replay(&self, method: MethodKind, key: &str) -> Option<&StoredReply> {
        self.replies.get(&(method, key.to_string()))
    }

    /// Store a reply, evicting the oldest once over capacity
    pub fn remember(&mut self, method: MethodKind, key: String, reply: StoredReply) {
        let key = (method, key);
        if self.replies.insert(key.clone(), reply).is_none() {
            self.reply_order.push_back(key);
        }

        while self.replies.len() > self.reply_capacity {
            match self.reply_order.pop_front() {
                Some(oldest) => {
                    self.replies.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }

    pub fn record(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Sandbox config
    pub config: Arc<SandboxConfig>,
    /// Settled payments and idempotent replies
    pub ledger: Arc<RwLock<Ledger>>,
}

impl AppState {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(Ledger::with_reply_capacity(config.reply_capacity))),
            config: Arc::new(config),
        }
    }

    /// State configured from the environment
    pub fn from_env() -> Self {
        Self::new(SandboxConfig::from_env())
    }

    pub async fn transaction_count(&self) -> usize {
        self.ledger.read().await.transactions().len()
    }
}

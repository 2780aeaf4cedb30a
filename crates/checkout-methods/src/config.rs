//! # Settlement Configuration
//!
//! Configuration for talking to the backend settlement endpoint.
//! Loaded from environment variables (with `.env` support) or from TOML.

use checkout_core::CheckoutError;
use serde::Deserialize;
use std::env;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_QR_VALIDITY_SECS: i64 = 600;
/// One day
const MAX_QR_VALIDITY_SECS: i64 = 86_400;

/// Settlement endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Base URL; requests go to `{api_base_url}/payments/{method}`
    #[serde(default = "default_base_url")]
    pub api_base_url: String,

    /// Static bearer token, when the host application has one up front
    #[serde(default)]
    pub api_token: Option<String>,

    /// Upper bound for one settlement call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed PromptPay receiver (phone or tax id) embedded in QR strings
    pub promptpay_receiver_id: String,

    /// Advisory validity window of a generated QR string
    #[serde(default = "default_qr_validity_secs")]
    pub qr_validity_secs: i64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_qr_validity_secs() -> i64 {
    DEFAULT_QR_VALIDITY_SECS
}

impl SettlementConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `PROMPTPAY_RECEIVER_ID`
    ///
    /// Optional:
    /// - `CHECKOUT_API_BASE_URL` (default `http://localhost:5000/api`)
    /// - `CHECKOUT_API_TOKEN`
    /// - `CHECKOUT_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let promptpay_receiver_id = env::var("PROMPTPAY_RECEIVER_ID").map_err(|_| {
            CheckoutError::Configuration("PROMPTPAY_RECEIVER_ID not set".to_string())
        })?;

        let timeout_secs = match env::var("CHECKOUT_TIMEOUT_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                CheckoutError::Configuration(format!(
                    "CHECKOUT_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                ))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            api_base_url: env::var("CHECKOUT_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_token: env::var("CHECKOUT_API_TOKEN").ok().filter(|t| !t.is_empty()),
            timeout_secs,
            promptpay_receiver_id,
            qr_validity_secs: DEFAULT_QR_VALIDITY_SECS,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML document
    pub fn from_toml(toml_str: &str) -> Result<Self, CheckoutError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| CheckoutError::Configuration(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(api_base_url: impl Into<String>, promptpay_receiver_id: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            promptpay_receiver_id: promptpay_receiver_id.into(),
            qr_validity_secs: DEFAULT_QR_VALIDITY_SECS,
        }
    }

    /// Check URL scheme, receiver id, timeout and QR window
    pub fn validate(&self) -> Result<(), CheckoutError> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(CheckoutError::Configuration(
                "api_base_url must start with http:// or https://".to_string(),
            ));
        }

        let receiver = &self.promptpay_receiver_id;
        if receiver.len() < 10
            || receiver.len() > 15
            || !receiver.chars().all(|c| c.is_ascii_digit())
        {
            return Err(CheckoutError::Configuration(
                "promptpay_receiver_id must be 10 to 15 digits".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(CheckoutError::Configuration(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        if !(1..=MAX_QR_VALIDITY_SECS).contains(&self.qr_validity_secs) {
            return Err(CheckoutError::Configuration(format!(
                "qr_validity_secs must be between 1 and {}",
                MAX_QR_VALIDITY_SECS
            )));
        }

        Ok(())
    }

    /// Full URL of the settlement endpoint for a method segment
    pub fn payment_url(&self, segment: &str) -> String {
        format!(
            "{}/payments/{}",
            self.api_base_url.trim_end_matches('/'),
            segment
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// QR window, clamped to `1..=86400` seconds for unvalidated configs
    pub fn qr_validity(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.qr_validity_secs.clamp(1, MAX_QR_VALIDITY_SECS))
    }

    /// Builder: set a static bearer token
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Builder: set the settlement timeout
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Builder: set the QR validity window
    pub fn with_qr_validity_secs(mut self, secs: i64) -> Self {
        self.qr_validity_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_url() {
        let config = SettlementConfig::new("https://shop.example/api/", "0812345678");
        assert_eq!(
            config.payment_url("stripe"),
            "https://shop.example/api/payments/stripe"
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(SettlementConfig::new("https://shop.example/api", "0812345678")
            .validate()
            .is_ok());
        assert!(SettlementConfig::new("ftp://shop.example", "0812345678")
            .validate()
            .is_err());
        assert!(SettlementConfig::new("https://shop.example", "08-1234")
            .validate()
            .is_err());
        assert!(SettlementConfig::new("https://shop.example", "0812345678")
            .with_timeout_secs(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = SettlementConfig::from_toml(
            r#"
            api_base_url = "https://shop.example/api"
            promptpay_receiver_id = "0812345678"
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.qr_validity_secs, 600);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_qr_validity_bounds() {
        let toml_with = |secs: &str| {
            SettlementConfig::from_toml(&format!(
                "promptpay_receiver_id = \"0812345678\"\nqr_validity_secs = {}\n",
                secs
            ))
        };

        for secs in ["9223372036854775807", "-5", "0", "86401"] {
            assert!(
                matches!(toml_with(secs), Err(CheckoutError::Configuration(_))),
                "qr_validity_secs = {} accepted",
                secs
            );
        }

        let config = toml_with("86400").unwrap();
        assert_eq!(config.qr_validity(), chrono::Duration::days(1));
    }

    #[test]
    fn test_qr_validity_clamped_without_validation() {
        let config = SettlementConfig::new("https://shop.example", "0812345678")
            .with_qr_validity_secs(i64::MAX);
        assert!(config.validate().is_err());
        assert_eq!(config.qr_validity(), chrono::Duration::seconds(86_400));

        let config = config.with_qr_validity_secs(-5);
        assert_eq!(config.qr_validity(), chrono::Duration::seconds(1));
    }

    #[test]
    fn test_from_toml_missing_receiver() {
        let result = SettlementConfig::from_toml(r#"api_base_url = "https://shop.example""#);
        assert!(matches!(result, Err(CheckoutError::Configuration(_))));
    }
}

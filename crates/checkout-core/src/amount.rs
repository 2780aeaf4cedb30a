//! # Amount Types
//!
//! Checkout amounts are whole-currency decimals (e.g. `899.99`), the same
//! unit the storefront shows. There is no minor-unit conversion: the card
//! method sends the amount rounded to the nearest whole unit, the QR method
//! sends it as-is.

use crate::error::{Field, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    THB,
    USD,
    EUR,
    GBP,
    JPY,
    SGD,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::THB => "thb",
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::SGD => "sgd",
        }
    }

    /// Display symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::THB => "฿",
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
            Currency::SGD => "S$",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::THB
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// A positive, finite checkout amount in whole currency units
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Amount(f64);

impl Amount {
    /// Create an amount, rejecting zero, negative and non-finite values
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::new(
                Field::Amount,
                "Amount must be a finite number",
            ));
        }
        if value <= 0.0 {
            return Err(ValidationError::new(
                Field::Amount,
                "Amount must be greater than zero",
            ));
        }
        Ok(Self(value))
    }

    /// The raw decimal value
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Nearest whole currency unit (`899.99 -> 900`)
    pub fn rounded(&self) -> i64 {
        self.0.round() as i64
    }

    /// Format for display with a currency symbol (e.g. "฿899.99")
    pub fn display(&self, currency: Currency) -> String {
        format!("{}{:.2}", currency.symbol(), self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<f64> for Amount {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Amount::new(value).map_err(serde::de::Error::custom)
    }
}

//! # Card Tokenization
//!
//! Card data never leaves the widget. Before a settlement call the card
//! number, expiry and CVV are folded into a single-use opaque token:
//! HMAC-SHA256 keyed by a random per-attempt salt, truncated, prefixed
//! with `tok_`. The salt is never transmitted or stored, so the token
//! cannot be reversed or replayed into another attempt, and it is bound to
//! no persistent card storage.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use uuid::Uuid;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Token prefix
pub const TOKEN_PREFIX: &str = "tok_";

/// Number of hex characters after the prefix
pub const TOKEN_HEX_LEN: usize = 24;

/// A single-use opaque card token
#[derive(Clone, PartialEq, Eq)]
pub struct CardToken(String);

impl CardToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether a string has the shape of a generated token
    pub fn is_well_formed(candidate: &str) -> bool {
        candidate
            .strip_prefix(TOKEN_PREFIX)
            .map(|hex| {
                hex.len() == TOKEN_HEX_LEN
                    && hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            })
            .unwrap_or(false)
    }
}

impl fmt::Debug for CardToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CardToken(..)")
    }
}

/// Derives tokens under one per-attempt salt
pub struct CardTokenizer {
    salt: [u8; 32],
}

impl CardTokenizer {
    /// Tokenizer with a fresh random salt
    pub fn new() -> Self {
        let mut salt = [0u8; 32];
        salt[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        salt[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self { salt }
    }

    /// Tokenizer with a fixed salt; the same input then yields the same token
    pub fn with_salt(salt: [u8; 32]) -> Self {
        Self { salt }
    }

    /// Derive the token for digits-only card number, `MM/YY` expiry and CVV
    pub fn tokenize(&self, number_digits: &str, expiry: &str, cvv: &str) -> CardToken {
        let mut mac =
            HmacSha256::new_from_slice(&self.salt).expect("HMAC can take key of any size");
        mac.update(number_digits.as_bytes());
        mac.update(b"|");
        mac.update(expiry.as_bytes());
        mac.update(b"|");
        mac.update(cvv.as_bytes());

        let digest = mac.finalize().into_bytes();
        let mut hex = hex::encode(digest);
        let token = format!("{}{}", TOKEN_PREFIX, &hex[..TOKEN_HEX_LEN]);
        hex.zeroize();

        CardToken(token)
    }
}

impl Default for CardTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CardTokenizer {
    fn drop(&mut self) {
        self.salt.zeroize();
    }
}

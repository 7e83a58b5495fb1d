//! # Payment notification signatures
//!
//! The payment provider signs every notification it sends, on both the webhook and the callback channel, with a secret
//! shared between the provider and this server. A notification whose signature does not check out is never allowed
//! near an order.
//!
//! ## Message format
//!
//! The signed message is the canonical form of four fields, joined by a pipe:
//!
//! ```text
//!    {payment_ref}|{status}|{amount}|{timestamp}
//! ```
//!
//! where
//!   * `payment_ref` is the order's payment reference (or the provider transaction id, when no reference is sent)
//!   * `status` is the provider status exactly as sent, e.g. `success`
//!   * `amount` is rendered with exactly two decimals, e.g. `1500.00`. Empty if no amount was sent.
//!   * `timestamp` is the provider timestamp exactly as sent
//!
//! A field that itself contains a `|` cannot be canonicalized, and the notification is rejected. Otherwise
//! `("a|b", "c")` and `("a", "b|c")` would produce the same message.
//!
//! The signature is `HMAC-SHA256(secret, message)`, hex encoded. An optional `sha256=` prefix is accepted.
use std::{fmt::Display, str::FromStr};

use hmac::{Hmac, Mac};
use log::*;
use ofg_common::Secret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const FIELD_DELIMITER: char = '|';
const SIGNATURE_HEX_LEN: usize = 64;
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
    #[default]
    Production,
    Development,
    Test,
}

impl DeploymentMode {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Development => write!(f, "development"),
            Self::Test => write!(f, "test"),
        }
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(format!("Unknown environment: {other}")),
        }
    }
}

/// The signed subset of a payment notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedFields<'a> {
    pub payment_ref: &'a str,
    pub status: &'a str,
    pub amount: &'a str,
    pub timestamp: &'a str,
}

/// Builds the message that the provider signs. Returns `None` if any field contains the delimiter.
pub fn canonicalize(fields: &SignedFields) -> Option<String> {
    let parts = [fields.payment_ref, fields.status, fields.amount, fields.timestamp];
    if parts.iter().any(|p| p.contains(FIELD_DELIMITER)) {
        return None;
    }
    Some(parts.join("|"))
}

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: Secret<String>,
    mode: DeploymentMode,
}

impl SignatureVerifier {
    pub fn new(secret: Secret<String>, mode: DeploymentMode) -> Self {
        if secret.is_unset() {
            if mode.is_production() {
                error!("🔐️ No webhook secret is configured. Every payment notification will be rejected.");
            } else {
                warn!("🔐️ No webhook secret is configured. Signature checks are DISABLED in {mode} mode.");
            }
        }
        Self { secret, mode }
    }

    pub fn mode(&self) -> DeploymentMode {
        self.mode
    }

    fn mac(&self, message: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.reveal().as_bytes()).ok()?;
        mac.update(message.as_bytes());
        Some(mac)
    }

    /// Produces the signature the provider would send for these fields. `None` if there is no secret, or the fields
    /// cannot be canonicalized.
    pub fn sign(&self, fields: &SignedFields) -> Option<String> {
        if self.secret.is_unset() {
            return None;
        }
        let message = canonicalize(fields)?;
        let mac = self.mac(&message)?;
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks `received` against the signature of `fields`. Never panics: anything unexpected is simply `false`.
    pub fn verify(&self, fields: &SignedFields, received: Option<&str>) -> bool {
        let Some(message) = canonicalize(fields) else {
            warn!("🔐️ Notification for [{}] contains the field delimiter. Rejected.", fields.payment_ref);
            return false;
        };
        if self.secret.is_unset() {
            if self.mode.is_production() {
                warn!("🔐️ Notification for [{}] rejected. No webhook secret is configured.", fields.payment_ref);
                return false;
            }
            warn!(
                "🔐️ Accepting UNVERIFIED notification for [{}]. No webhook secret is configured ({} mode).",
                fields.payment_ref, self.mode
            );
            return true;
        }
        let Some(received) = received.map(str::trim) else {
            debug!("🔐️ Notification for [{}] carries no signature", fields.payment_ref);
            return false;
        };
        let received = received.strip_prefix(SIGNATURE_PREFIX).unwrap_or(received);
        if received.len() != SIGNATURE_HEX_LEN {
            debug!("🔐️ Signature for [{}] has the wrong length", fields.payment_ref);
            return false;
        }
        let Ok(received) = hex::decode(received) else {
            debug!("🔐️ Signature for [{}] is not valid hex", fields.payment_ref);
            return false;
        };
        // verify_slice compares in constant time
        self.mac(&message).map(|mac| mac.verify_slice(&received).is_ok()).unwrap_or(false)
    }
}

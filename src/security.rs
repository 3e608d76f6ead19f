//! Token signing, verification, and the call principal.
//!
//! DESIGN
//! ======
//! Tokens are detached-signature credentials: `hex(payload).hex(mac)` where
//! the payload is the JSON-encoded [`UserToken`] and the MAC is HMAC-SHA256
//! over the payload bytes. Verification never trusts a field before the
//! signature checks out. Identity is carried as a [`Principal`] value built
//! from a verified token — there is no process-wide "current user" slot.

use std::fmt::Write;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// HEX
// =============================================================================

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

pub(crate) fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

// =============================================================================
// TOKEN
// =============================================================================

/// Signed claims carried by a token: who, until when, and with which roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserToken {
    /// Subject identifier (user id).
    pub subject: String,
    /// Expiry instant, milliseconds since the Unix epoch.
    pub expires_at: i64,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserToken {
    /// Claims for `subject` expiring `ttl_seconds` from now.
    #[must_use]
    pub fn new(subject: impl Into<String>, ttl_seconds: i64, roles: Vec<String>) -> Self {
        let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        Self {
            subject: subject.into(),
            expires_at: i64::try_from(now_ms).unwrap_or(0) + ttl_seconds * 1000,
            roles,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        let now_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        i128::from(self.expires_at) <= now_ms
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token encoding failed: {0}")]
    Encode(String),
}

/// Sign claims into a transportable token string.
///
/// # Errors
///
/// Returns [`TokenError::Encode`] if the claims cannot be serialized or the
/// signing key is unusable.
pub fn sign(token: &UserToken, key: &[u8]) -> Result<String, TokenError> {
    let payload = serde_json::to_vec(token).map_err(|e| TokenError::Encode(e.to_string()))?;
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).map_err(|e| TokenError::Encode(e.to_string()))?;
    mac.update(&payload);
    let sig = mac.finalize().into_bytes();
    Ok(format!("{}.{}", bytes_to_hex(&payload), bytes_to_hex(&sig)))
}

/// Verify a token string and return its claims.
///
/// # Errors
///
/// [`TokenError::Malformed`] when the string does not split into payload and
/// signature, [`TokenError::BadSignature`] when the MAC does not match, and
/// [`TokenError::Expired`] when the expiry instant has passed.
pub fn verify(raw: &str, key: &[u8]) -> Result<UserToken, TokenError> {
    let (payload_hex, sig_hex) = raw.split_once('.').ok_or(TokenError::Malformed)?;
    let payload = hex_to_bytes(payload_hex).ok_or(TokenError::Malformed)?;
    let sig = hex_to_bytes(sig_hex).ok_or(TokenError::Malformed)?;

    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).map_err(|e| TokenError::Encode(e.to_string()))?;
    mac.update(&payload);
    mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

    let token: UserToken = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
    if token.is_expired() {
        return Err(TokenError::Expired);
    }
    Ok(token)
}

// =============================================================================
// PRINCIPAL
// =============================================================================

/// The verified identity bound to one logical call.
#[derive(Debug, Clone)]
pub struct Principal {
    pub subject: String,
    pub roles: Vec<String>,
    /// The raw token string the principal was derived from.
    pub token: String,
}

impl Principal {
    /// Verify `raw` against `key` and build the principal it identifies.
    ///
    /// # Errors
    ///
    /// Propagates the [`TokenError`] from verification.
    pub fn from_token(raw: &str, key: &[u8]) -> Result<Self, TokenError> {
        let claims = verify(raw, key)?;
        Ok(Self { subject: claims.subject, roles: claims.roles, token: raw.to_owned() })
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
#[path = "security_test.rs"]
mod tests;

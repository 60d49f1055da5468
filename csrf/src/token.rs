//! Signed, time-bound anti-forgery tokens.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use log::*;
use rand::Rng;
use sha2::Sha256;

use crate::error::{token_error, Error, ErrorKind};

type HmacSha256 = Hmac<Sha256>;

/// Number of HMAC output bytes kept in a token (16 hex characters).
const SIGNATURE_BYTES: usize = 8;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Issues and verifies CSRF tokens.
///
/// A token is `base64("<timestamp base36>:<nonce hex>:<session id>:<signature hex>")`
/// where the signature is HMAC-SHA256 over the first three fields, truncated to
/// 64 bits. The key lives for as long as this value does; construct one per
/// process and share it.
#[derive(Clone)]
pub struct CsrfProtection {
    keyed: HmacSha256,
    max_age: Duration,
}

impl CsrfProtection {
    /// Create a protector keyed with a fresh random 256-bit secret and a 24 hour max age.
    pub fn new() -> Self {
        let secret: [u8; 32] = rand::thread_rng().gen();
        Self::with_secret(secret)
    }

    /// Create a protector keyed with a caller-supplied secret.
    ///
    /// Tokens survive a restart only when the same secret is supplied again.
    pub fn with_secret(secret: impl AsRef<[u8]>) -> Self {
        let keyed = <HmacSha256 as Mac>::new_from_slice(secret.as_ref())
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        Self {
            keyed,
            max_age: Duration::hours(24),
        }
    }

    /// Override the maximum token age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Generate a token bound to `session_id` (which may be empty).
    pub fn generate_token(&self, session_id: &str) -> String {
        self.generate_token_at(session_id, Utc::now())
    }

    /// Generate a token as if it had been issued at `issued_at`.
    pub fn generate_token_at(&self, session_id: &str, issued_at: DateTime<Utc>) -> String {
        let nonce: [u8; 16] = rand::thread_rng().gen();
        let millis = u64::try_from(issued_at.timestamp_millis()).unwrap_or(0);
        let payload = format!("{}:{}:{}", to_base36(millis), hex::encode(nonce), session_id);
        let signature = self.sign(&payload);

        STANDARD.encode(format!("{payload}:{signature}"))
    }

    /// Returns `true` only for an untampered, unexpired token.
    ///
    /// A non-empty `session_id` must equal the one embedded in the token. Every
    /// failure, including undecodable input, yields `false`.
    pub fn validate_token(&self, token: &str, session_id: &str) -> bool {
        self.validate_token_at(token, session_id, Utc::now())
    }

    /// [`validate_token`](Self::validate_token) evaluated at a fixed instant.
    pub fn validate_token_at(&self, token: &str, session_id: &str, now: DateTime<Utc>) -> bool {
        match self.verify(token, session_id, now) {
            Ok(()) => true,
            Err(e) => {
                debug!("Rejected CSRF token: {e}");
                false
            }
        }
    }

    /// Verify a token, reporting why it was rejected.
    pub fn verify(&self, token: &str, session_id: &str, now: DateTime<Utc>) -> Result<(), Error> {
        let decoded = String::from_utf8(STANDARD.decode(token)?)?;

        let parts: Vec<&str> = decoded.split(':').collect();
        let [timestamp, nonce, embedded_session, signature] = parts.as_slice() else {
            return Err(token_error(
                ErrorKind::Malformed,
                &format!("expected 4 fields, found {}", parts.len()),
            ));
        };

        if !is_signature_hex(signature) {
            return Err(token_error(
                ErrorKind::SignatureMismatch,
                "signature is not 16 lowercase hex characters",
            ));
        }
        let expected = hex::decode(signature)
            .map_err(|_| token_error(ErrorKind::SignatureMismatch, "signature is not hex"))?;

        let mut mac = self.keyed.clone();
        mac.update(format!("{timestamp}:{nonce}:{embedded_session}").as_bytes());
        mac.verify_truncated_left(&expected)
            .map_err(|_| token_error(ErrorKind::SignatureMismatch, "signature does not match"))?;

        if !session_id.is_empty() && session_id != *embedded_session {
            return Err(token_error(
                ErrorKind::SessionMismatch,
                "token was issued for another session",
            ));
        }

        let issued_at = parse_timestamp(timestamp)?;
        if now - issued_at > self.max_age {
            return Err(token_error(ErrorKind::Expired, "token is too old"));
        }

        Ok(())
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.keyed.clone();
        mac.update(payload.as_bytes());
        let digest = mac.finalize().into_bytes();
        hex::encode(&digest[..SIGNATURE_BYTES])
    }
}

impl Default for CsrfProtection {
    fn default() -> Self {
        Self::new()
    }
}

fn is_signature_hex(signature: &str) -> bool {
    signature.len() == SIGNATURE_BYTES * 2
        && signature
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, Error> {
    let millis = u64::from_str_radix(timestamp, 36)
        .ok()
        .and_then(|m| i64::try_from(m).ok())
        .ok_or_else(|| token_error(ErrorKind::Malformed, "timestamp is not base36"))?;

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| token_error(ErrorKind::Malformed, "timestamp out of range"))
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.iter().rev().map(|&b| b as char).collect()
}

//! Webhook signature primitives.
//!
//! The payment gateway signs every webhook delivery with a shared secret. The signature header has the form
//! `t=<unix seconds>,v1=<hex hmac>`, where the HMAC-SHA256 is computed over `"{t}.{raw body}"`. The timestamp bounds
//! the replay window.
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("The signature header is malformed")]
    Malformed,
    #[error("The signature timestamp is outside the tolerance window")]
    Stale,
    #[error("The signature does not match the payload")]
    Mismatch,
}

/// Computes the hex signature for a payload at the given timestamp.
pub fn payment_signature(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a `t=...,v1=...` signature header against the raw payload. Any `v1` entry in the header may match;
/// the comparison is constant-time.
pub fn verify_signature_header(
    secret: &str,
    header: &str,
    body: &[u8],
    tolerance: Duration,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", sig)) => candidates.push(sig.to_string()),
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }
    let age = now.timestamp() - timestamp;
    if age.abs() > tolerance.num_seconds() {
        return Err(SignatureError::Stale);
    }
    for candidate in candidates {
        let expected = hex::decode(candidate).map_err(|_| SignatureError::Malformed)?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(SignatureError::Mismatch)
}

// src/api/stripe_signature.rs
//
// Stripe webhook signatures: `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`
// where each v1 is HMAC-SHA256 over "<t>.<raw body>" keyed by the endpoint secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("webhook secret is not configured")]
    MissingSecret,
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("timestamp outside tolerance")]
    Expired,
    #[error("no matching signature")]
    Mismatch,
}

fn mac(secret: &str, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::MissingSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// HMAC-SHA256 of "<timestamp>.<payload>" in hex.
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    let result = mac(secret, timestamp, payload)?.finalize().into_bytes();
    Ok(hex::encode(result))
}

/// A complete `Stripe-Signature` header value for `payload`.
pub fn header_value(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String, SignatureError> {
    Ok(format!("t={timestamp},v1={}", sign(secret, timestamp, payload)?))
}

/// Fails closed: a missing secret or header never verifies.
pub fn verify(
    secret: Option<&str>,
    header: Option<&str>,
    payload: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let secret = secret.filter(|s| !s.is_empty()).ok_or(SignatureError::MissingSecret)?;
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if candidates.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if now.abs_diff(timestamp) > TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let expected = mac(secret, timestamp, payload)?;
    let matched = candidates
        .iter()
        .filter_map(|c| hex::decode(c).ok())
        .any(|sig| expected.clone().verify_slice(&sig).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

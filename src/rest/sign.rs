use crate::errors::BinanceError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Current timestamp in milliseconds since the Unix epoch (local clock; no
/// server-time synchronization)
#[allow(clippy::cast_possible_truncation)]
pub fn timestamp_ms() -> Result<u64, BinanceError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| BinanceError::Other(format!("Failed to get timestamp: {}", e)))
}

/// HMAC-SHA256 signature over `payload`, hex-encoded lowercase
pub fn signature(secret: &str, payload: &str) -> Result<String, BinanceError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BinanceError::Auth(format!("Invalid HMAC key: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Append `timestamp` to the raw parameter string, sign the result, and
/// append `signature` last.
///
/// The signature covers exactly the bytes of `raw_params&timestamp=<ts>`
/// (just `timestamp=<ts>` when `raw_params` is empty); the returned query is
/// `...&timestamp=<ts>&signature=<hex>`. The raw parameters themselves are
/// never reordered or re-encoded.
pub fn signed_query(raw_params: &str, secret: &str, timestamp: u64) -> Result<String, BinanceError> {
    let mut query = if raw_params.is_empty() {
        format!("timestamp={}", timestamp)
    } else {
        format!("{}&timestamp={}", raw_params, timestamp)
    };
    let sig = signature(secret, &query)?;
    query.push_str("&signature=");
    query.push_str(&sig);
    Ok(query)
}

//! Base64url key validation for push subscriptions and VAPID keys.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use dealwire_core::{Error, PushSubscription, Result};

/// Uncompressed P-256 public key: 0x04 || X || Y.
pub const P256_PUBLIC_KEY_LEN: usize = 65;

/// Push authentication secret.
pub const AUTH_SECRET_LEN: usize = 16;

fn decode_raw(value: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value.trim().trim_end_matches('='))
}

/// Decode unpadded or padded base64url.
pub fn decode_base64url(value: &str) -> Result<Vec<u8>> {
    decode_raw(value).map_err(|e| Error::InvalidInput(format!("invalid base64url: {}", e)))
}

fn decode_exact(name: &str, value: &str, len: usize) -> Result<Vec<u8>> {
    let bytes = decode_raw(value)
        .map_err(|e| Error::InvalidInput(format!("{} is not base64url: {}", name, e)))?;
    if bytes.len() != len {
        return Err(Error::InvalidInput(format!(
            "{}: expected {} bytes, got {}",
            name,
            len,
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// Decode a VAPID application server key.
pub fn decode_vapid_key(value: &str) -> Result<Vec<u8>> {
    decode_exact("vapid public key", value, P256_PUBLIC_KEY_LEN)
}

/// Check a platform subscription before it is sent to the server.
pub fn validate_subscription(subscription: &PushSubscription) -> Result<()> {
    let endpoint = subscription.endpoint.trim();
    if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
        return Err(Error::InvalidInput(format!(
            "push endpoint is not an http(s) url: {}",
            endpoint
        )));
    }
    decode_exact("p256dh", &subscription.keys.p256dh, P256_PUBLIC_KEY_LEN)?;
    decode_exact("auth", &subscription.keys.auth, AUTH_SECRET_LEN)?;
    Ok(())
}

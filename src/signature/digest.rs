//! Timestamped HMAC-SHA256 request signatures.
//!
//! The signed message is `"{timestamp}{nonce}{method}{path}"` and the
//! signature is the lowercase hex digest. Timestamps are unix seconds and
//! must be within the configured window of the server clock, in either
//! direction.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Why a digest did not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestFailure {
    /// Timestamp header absent.
    MissingTimestamp,
    /// Timestamp unparsable or outside the window.
    Stale,
    /// Signature is not hex, or does not match.
    Mismatch,
}

fn message(timestamp: &str, nonce: &str, method: &str, path: &str) -> String {
    format!("{timestamp}{nonce}{method}{path}")
}

/// Hex HMAC-SHA256 over the request fields.
pub fn sign(secret: &str, timestamp: &str, nonce: &str, method: &str, path: &str) -> String {
    // HMAC accepts keys of any length, new_from_slice cannot fail here.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message(timestamp, nonce, method, path).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify `signature` in constant time, then check freshness.
#[allow(clippy::too_many_arguments)]
pub fn verify(
    secret: &str,
    signature: &str,
    timestamp: Option<&str>,
    nonce: &str,
    method: &str,
    path: &str,
    now_secs: u64,
    window_secs: u64,
) -> Result<(), DigestFailure> {
    let timestamp = timestamp.ok_or(DigestFailure::MissingTimestamp)?;
    let ts: u64 = timestamp.trim().parse().map_err(|_| DigestFailure::Stale)?;
    if now_secs.abs_diff(ts) > window_secs {
        return Err(DigestFailure::Stale);
    }

    let expected = hex::decode(signature.trim()).map_err(|_| DigestFailure::Mismatch)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| DigestFailure::Mismatch)?;
    mac.update(message(timestamp, nonce, method, path).as_bytes());
    mac.verify_slice(&expected).map_err(|_| DigestFailure::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_sign_and_verify() {
        let sig = sign("secret", "1700000000", "n1", "POST", "/api/orders");
        assert_eq!(sig.len(), 64);
        assert_eq!(
            verify("secret", &sig, Some("1700000000"), "n1", "POST", "/api/orders", NOW, 300),
            Ok(())
        );
    }

    #[test]
    fn test_any_field_change_is_a_mismatch() {
        let sig = sign("secret", "1700000000", "n1", "POST", "/api/orders");
        assert_eq!(
            verify("secret", &sig, Some("1700000000"), "n1", "GET", "/api/orders", NOW, 300),
            Err(DigestFailure::Mismatch)
        );
        assert_eq!(
            verify("other", &sig, Some("1700000000"), "n1", "POST", "/api/orders", NOW, 300),
            Err(DigestFailure::Mismatch)
        );
        assert_eq!(
            verify("secret", "zz-not-hex", Some("1700000000"), "n1", "POST", "/api/orders", NOW, 300),
            Err(DigestFailure::Mismatch)
        );
    }

    #[test]
    fn test_time_window() {
        let ts = (NOW - 301).to_string();
        let sig = sign("secret", &ts, "", "GET", "/api");
        assert_eq!(
            verify("secret", &sig, Some(&ts), "", "GET", "/api", NOW, 300),
            Err(DigestFailure::Stale)
        );

        let ts = (NOW + 300).to_string();
        let sig = sign("secret", &ts, "", "GET", "/api");
        assert_eq!(verify("secret", &sig, Some(&ts), "", "GET", "/api", NOW, 300), Ok(()));
    }

    #[test]
    fn test_missing_timestamp() {
        assert_eq!(
            verify("secret", "00", None, "", "GET", "/api", NOW, 300),
            Err(DigestFailure::MissingTimestamp)
        );
    }
}

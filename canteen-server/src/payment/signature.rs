//! `Paymongo-Signature` verification
//!
//! Header format: `t=<unix secs>,te=<hex>,li=<hex>`. The HMAC-SHA256 of
//! `"{t}.{raw body}"` under the webhook secret is carried in `li` for live
//! events and in `te` for test events.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::WebhookVerificationError;

/// Maximum distance between the signed timestamp and now
pub const TOLERANCE_SECS: i64 = 300;

struct SignatureHeader<'a> {
    timestamp: &'a str,
    test: &'a str,
    live: &'a str,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, WebhookVerificationError> {
    let mut parsed = SignatureHeader {
        timestamp: "",
        test: "",
        live: "",
    };
    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            parsed.timestamp = t;
        } else if let Some(v) = part.strip_prefix("te=") {
            parsed.test = v;
        } else if let Some(v) = part.strip_prefix("li=") {
            parsed.live = v;
        }
    }
    if parsed.timestamp.is_empty() || (parsed.test.is_empty() && parsed.live.is_empty()) {
        return Err(WebhookVerificationError::MalformedSignature);
    }
    Ok(parsed)
}

/// Verify `header` against the raw request body.
///
/// The MAC is checked before the timestamp so a forged header never learns
/// anything about the tolerance window.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), WebhookVerificationError> {
    let header = parse_header(header)?;
    let signature = if header.live.is_empty() {
        header.test
    } else {
        header.live
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookVerificationError::MalformedSignature)?;
    mac.update(header.timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let sig_bytes =
        hex::decode(signature).map_err(|_| WebhookVerificationError::MalformedSignature)?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| WebhookVerificationError::SignatureMismatch)?;

    let ts: i64 = header
        .timestamp
        .parse()
        .map_err(|_| WebhookVerificationError::MalformedSignature)?;
    if (now_secs - ts).abs() > TOLERANCE_SECS {
        return Err(WebhookVerificationError::TimestampOutOfTolerance);
    }

    Ok(())
}

/// Build a header the way the gateway signs a delivery
#[cfg(test)]
pub(crate) fn sign(payload: &[u8], secret: &str, timestamp: i64, live: bool) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    let sig = hex::encode(mac.finalize().into_bytes());
    if live {
        format!("t={timestamp},te=,li={sig}")
    } else {
        format!("t={timestamp},te={sig},li=")
    }
}

//! Webhook request verification: payload signatures and the subscription
//! handshake.

use {
    hmac::{Hmac, Mac},
    serde::Deserialize,
    sha2::Sha256,
    tracing::warn,
};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex hmac of the raw body>`.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";
const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,
    #[error("signature header malformed")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
}

impl SignatureError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "signature_missing",
            Self::Malformed => "signature_malformed",
            Self::Mismatch => "signature_mismatch",
        }
    }
}

/// Check `header` against an HMAC-SHA256 of `body` keyed with `app_secret`.
///
/// The header must be exactly `sha256=` followed by 64 hex digits.
pub fn verify_signature(
    body: &[u8],
    header: Option<&str>,
    app_secret: &str,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let digest_hex = header
        .strip_prefix(SIGNATURE_PREFIX)
        .filter(|hex| hex.len() == DIGEST_HEX_LEN)
        .ok_or(SignatureError::Malformed)?;
    let expected = hex::decode(digest_hex).map_err(|_| SignatureError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).map_err(|_| {
        warn!("failed to key webhook hmac");
        SignatureError::Mismatch
    })?;
    mac.update(body);
    // verify_slice compares in constant time.
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Query of the subscription handshake GET.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerificationQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Echo this challenge back verbatim.
    Accepted(String),
    MissingParams,
    Forbidden,
}

pub fn verify_subscription(query: &VerificationQuery, verify_token: &str) -> Verification {
    let (Some(mode), Some(token), Some(challenge)) =
        (&query.mode, &query.verify_token, &query.challenge)
    else {
        return Verification::MissingParams;
    };
    if mode == "subscribe" && !verify_token.is_empty() && token == verify_token {
        Verification::Accepted(challenge.clone())
    } else {
        Verification::Forbidden
    }
}

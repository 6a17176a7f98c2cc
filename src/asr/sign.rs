//! Request signing for the iFlytek transcription API
//!
//! Every request carries an RFC-1123 date, a base64 SHA-256 digest of the
//! body, and an HMAC-SHA256 signature over the canonical string
//! `host: <host>\ndate: <date>\nPOST <uri> HTTP/1.1\ndigest: <digest>`.
//! The assembled `Authorization` value is a wire-compatibility
//! requirement and must not be altered.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// The three signed headers attached to every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// RFC-1123 HTTP date
    pub date: String,
    /// `SHA-256=<base64 digest of the body>`
    pub digest: String,
    /// Assembled `Authorization` value
    pub authorization: String,
}

/// Format an instant as an RFC-1123 HTTP date (always GMT)
#[must_use]
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Sign a request body for the given URI path
///
/// Deterministic: fixed (body, date, secret) always produces the same
/// digest and signature bytes.
#[must_use]
pub fn auth_headers(
    body: &str,
    uri: &str,
    host: &str,
    api_key: &str,
    api_secret: &str,
    date: &str,
) -> SignedHeaders {
    let digest = format!("SHA-256={}", BASE64.encode(Sha256::digest(body.as_bytes())));

    let canonical = format!("host: {host}\ndate: {date}\nPOST {uri} HTTP/1.1\ndigest: {digest}");

    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let authorization = format!(
        "api_key=\"{api_key}\", algorithm=\"hmac-sha256\", \
         headers=\"host date request-line digest\", signature=\"{signature}\""
    );

    SignedHeaders {
        date: date.to_string(),
        digest,
        authorization,
    }
}

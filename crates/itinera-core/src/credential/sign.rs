//! Canonicalized, HMAC-SHA1 signed query strings for the speech token
//! endpoint.
//!
//! The signature covers `GET&%2F&<percent-encoded canonical query>`, keyed
//! with the access-key secret plus a trailing `&`. Percent-encoding keeps
//! only the RFC 3986 unreserved set (`A-Z a-z 0-9 - _ . ~`), so spaces
//! become `%20` and `*` becomes `%2A`.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::CredentialError;

type HmacSha1 = Hmac<Sha1>;

/// Region the token endpoint lives in.
pub const REGION_ID: &str = "cn-shanghai";

/// API version of the `CreateToken` action.
pub const API_VERSION: &str = "2019-02-28";

/// Timestamp format the endpoint expects (ISO-8601, UTC, whole seconds).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A signed request, built fresh for every acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Sorted, percent-encoded `key=value` pairs joined with `&`.
    pub canonical_query_string: String,
    /// Base64 HMAC-SHA1 signature, not yet percent-encoded.
    pub signature: String,
}

impl SignedRequest {
    /// Canonicalize `params` and sign them with `secret`.
    ///
    /// `BTreeMap` iteration order is the byte order of the keys, which is
    /// the order the endpoint canonicalizes in.
    pub fn build(params: &BTreeMap<String, String>, secret: &str) -> Result<Self, CredentialError> {
        let canonical_query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let string_to_sign = string_to_sign("GET", &canonical_query_string);
        let key = format!("{secret}&");
        let signature = BASE64.encode(compute_hmac(key.as_bytes(), string_to_sign.as_bytes())?);

        Ok(Self {
            canonical_query_string,
            signature,
        })
    }

    /// The full request URL: `<endpoint>/?Signature=<enc(sig)>&<canonical>`.
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/?Signature={}&{}",
            endpoint.trim_end_matches('/'),
            percent_encode(&self.signature),
            self.canonical_query_string
        )
    }
}

/// The `CreateToken` parameter set.
pub fn token_params(
    access_key_id: &str,
    nonce: &str,
    timestamp: DateTime<Utc>,
) -> BTreeMap<String, String> {
    [
        ("AccessKeyId", access_key_id.to_string()),
        ("Action", "CreateToken".to_string()),
        ("Format", "JSON".to_string()),
        ("RegionId", REGION_ID.to_string()),
        ("SignatureMethod", "HMAC-SHA1".to_string()),
        ("SignatureNonce", nonce.to_string()),
        ("SignatureVersion", "1.0".to_string()),
        ("Timestamp", timestamp.format(TIMESTAMP_FORMAT).to_string()),
        ("Version", API_VERSION.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// A fresh random nonce: 16 random bytes, hex-encoded.
///
/// Only collision avoidance matters here; the nonce is not a secret.
pub fn generate_nonce() -> String {
    use rand::Rng;
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// `METHOD&%2F&<enc(canonical)>`.
fn string_to_sign(method: &str, canonical_query_string: &str) -> String {
    format!(
        "{method}&{}&{}",
        percent_encode("/"),
        percent_encode(canonical_query_string)
    )
}

fn percent_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn compute_hmac(key: &[u8], message: &[u8]) -> Result<Vec<u8>, CredentialError> {
    let mut mac =
        HmacSha1::new_from_slice(key).map_err(|e| CredentialError::Signature(e.to_string()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

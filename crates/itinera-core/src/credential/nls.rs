//! Token acquisition against the NLS metadata endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::sign::{SignedRequest, generate_nonce, token_params};
use super::{CredentialError, IssuedToken, TokenSource};

/// Default token endpoint (`CreateToken`).
pub const DEFAULT_TOKEN_ENDPOINT: &str = "http://nls-meta.cn-shanghai.aliyuncs.com";

/// Default one-shot speech recognition gateway.
pub const DEFAULT_GATEWAY_URL: &str = "https://nls-gateway.cn-shanghai.aliyuncs.com/stream/v1/asr";

/// Upper bound on a token request.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a speech recognition request.
pub const DEFAULT_SPEECH_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the speech service.
#[derive(Debug, Clone)]
pub struct NlsConfig {
    /// Project app key sent with every recognition request.
    pub app_key: String,
    pub access_key_id: String,
    pub access_key_secret: String,
    pub token_endpoint: String,
    pub gateway_url: String,
    pub token_timeout: Duration,
    pub speech_timeout: Duration,
}

impl NlsConfig {
    /// Settings with the default endpoints and timeouts.
    pub fn new(
        app_key: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
            speech_timeout: DEFAULT_SPEECH_TIMEOUT,
        }
    }

    /// Whether both halves of the access key are present.
    pub fn has_access_key(&self) -> bool {
        !self.access_key_id.trim().is_empty() && !self.access_key_secret.trim().is_empty()
    }
}

/// Acquires tokens by signing a `CreateToken` request and issuing a GET.
pub struct NlsTokenSource {
    client: reqwest::Client,
    access_key_id: String,
    access_key_secret: String,
    endpoint: String,
}

impl NlsTokenSource {
    /// Build a source from `config`.
    ///
    /// Fails with [`CredentialError::NotConfigured`] when the access key is
    /// incomplete.
    pub fn new(config: &NlsConfig) -> Result<Self, CredentialError> {
        if !config.has_access_key() {
            return Err(CredentialError::NotConfigured);
        }
        let client = reqwest::Client::builder()
            .timeout(config.token_timeout)
            .build()
            .map_err(|e| CredentialError::AcquisitionFailed(format!("http client: {e}")))?;
        Ok(Self {
            client,
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.clone(),
            endpoint: config.token_endpoint.clone(),
        })
    }

    /// The signed request URL for the given nonce and time.
    pub fn signed_url(&self, nonce: &str, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let params = token_params(&self.access_key_id, nonce, now);
        let signed = SignedRequest::build(&params, &self.access_key_secret)?;
        Ok(signed.url(&self.endpoint))
    }
}

#[async_trait]
impl TokenSource for NlsTokenSource {
    async fn acquire(&self) -> Result<IssuedToken, CredentialError> {
        let url = self.signed_url(&generate_nonce(), Utc::now())?;

        let response = self.client.get(&url).send().await.map_err(|e| {
            CredentialError::AcquisitionFailed(format!("token request failed: {e}"))
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            CredentialError::AcquisitionFailed(format!("reading token response: {e}"))
        })?;

        if !status.is_success() {
            tracing::warn!(%status, "token endpoint rejected request");
            let detail = error_message(&body).unwrap_or(body);
            return Err(CredentialError::AcquisitionFailed(format!(
                "token endpoint returned {status}: {detail}"
            )));
        }

        parse_token_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "Token")]
    token: Option<TokenBody>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(rename = "Id")]
    id: String,
    /// Absolute expiry, unix seconds.
    #[serde(rename = "ExpireTime")]
    expire_time: i64,
}

/// Extract the token and its absolute expiry from a `CreateToken` body.
pub(crate) fn parse_token_response(body: &str) -> Result<IssuedToken, CredentialError> {
    let parsed: TokenResponse = serde_json::from_str(body).map_err(|e| {
        CredentialError::AcquisitionFailed(format!("malformed token response: {e}"))
    })?;

    let Some(token) = parsed.token else {
        let reason = parsed
            .message
            .unwrap_or_else(|| "response has no Token".to_string());
        return Err(CredentialError::AcquisitionFailed(reason));
    };
    if token.id.trim().is_empty() {
        return Err(CredentialError::AcquisitionFailed(
            "token response has an empty Id".to_string(),
        ));
    }
    let expires_at = DateTime::from_timestamp(token.expire_time, 0).ok_or_else(|| {
        CredentialError::AcquisitionFailed(format!(
            "ExpireTime out of range: {}",
            token.expire_time
        ))
    })?;

    Ok(IssuedToken {
        value: token.id,
        expires_at,
    })
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<TokenResponse>(body)
        .ok()
        .and_then(|r| r.message)
}

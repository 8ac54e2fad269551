//! One-shot speech recognition against the NLS gateway.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use super::UpstreamError;
use crate::credential::{CredentialCache, CredentialError, NlsConfig, TokenSource};

/// Gateway status for a successful recognition.
pub const STATUS_SUCCESS: u64 = 20_000_000;

/// Sample rate sent with every request.
pub const SAMPLE_RATE: u32 = 16_000;

/// Errors from [`SpeechClient`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpeechError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("audio is not valid base64: {0}")]
    InvalidAudio(String),
}

/// Sends audio to the gateway, authenticated by a cached credential.
pub struct SpeechClient<S> {
    client: reqwest::Client,
    credentials: Arc<CredentialCache<S>>,
    app_key: String,
    gateway_url: String,
}

impl<S: TokenSource> SpeechClient<S> {
    pub fn new(
        config: &NlsConfig,
        credentials: Arc<CredentialCache<S>>,
    ) -> Result<Self, SpeechError> {
        if config.app_key.trim().is_empty() {
            return Err(CredentialError::NotConfigured.into());
        }
        let client = reqwest::Client::builder()
            .timeout(config.speech_timeout)
            .build()
            .map_err(|e| UpstreamError::transport(format!("http client: {e}")))?;
        Ok(Self {
            client,
            credentials,
            app_key: config.app_key.clone(),
            gateway_url: config.gateway_url.clone(),
        })
    }

    /// Recognize raw audio bytes in the given container `format` (`wav`,
    /// `pcm`, `mp3`, ...).
    ///
    /// A credential is obtained first; without one the gateway is never
    /// contacted.
    pub async fn recognize(&self, audio: Vec<u8>, format: &str) -> Result<String, SpeechError> {
        let token = self.credentials.get().await?;

        tracing::info!(bytes = audio.len(), format, "sending audio for recognition");
        let sample_rate = SAMPLE_RATE.to_string();
        let response = self
            .client
            .post(&self.gateway_url)
            .header("X-NLS-Token", token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .query(&[
                ("appkey", self.app_key.as_str()),
                ("format", format),
                ("sample_rate", sample_rate.as_str()),
                ("enable_punctuation_prediction", "true"),
                ("enable_inverse_text_normalization", "true"),
                ("enable_voice_detection", "true"),
            ])
            .body(audio)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::transport("speech recognition timed out")
                } else {
                    UpstreamError::transport(format!("speech request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(format!("reading speech response: {e}")))?;

        let text = parse_recognition(status.as_u16(), &body)?;
        tracing::info!(chars = text.chars().count(), "speech recognized");
        Ok(text)
    }

    /// Decode base64 audio, then [`Self::recognize`] it.
    pub async fn recognize_base64(&self, audio: &str, format: &str) -> Result<String, SpeechError> {
        let bytes = BASE64
            .decode(audio.trim())
            .map_err(|e| SpeechError::InvalidAudio(e.to_string()))?;
        self.recognize(bytes, format).await
    }
}

/// Interpret a gateway response body.
///
/// The recognized text is `result`, either a string or an object with a
/// `text` field.
pub(crate) fn parse_recognition(http_status: u16, body: &str) -> Result<String, UpstreamError> {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let message = parsed
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(body)
        .to_string();

    if !(200..300).contains(&http_status) {
        return Err(UpstreamError::CallFailed {
            status: Some(http_status),
            code: None,
            message,
        });
    }

    let gateway_status = parsed.get("status").and_then(Value::as_u64);
    if gateway_status != Some(STATUS_SUCCESS) {
        return Err(UpstreamError::CallFailed {
            status: Some(http_status),
            code: gateway_status.map(|s| s.to_string()),
            message,
        });
    }

    let text = match parsed.get("result") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(obj)) => obj
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    Ok(text)
}

//! DashScope text generation over HTTP.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenerativeBackend, Generation, UpstreamError};

/// Default text-generation endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";

/// Default model.
pub const DEFAULT_MODEL: &str = "qwen-max";

/// Itinerary generation routinely takes well over 30 seconds.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for [`DashScopeBackend`].
#[derive(Debug, Clone)]
pub struct DashScopeConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl DashScopeConfig {
    /// Settings with the default model, endpoint, and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`GenerativeBackend`] backed by the DashScope REST API.
pub struct DashScopeBackend {
    client: reqwest::Client,
    config: DashScopeConfig,
}

impl DashScopeBackend {
    pub fn new(config: DashScopeConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UpstreamError::transport(format!("http client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: RequestInput<'a>,
    parameters: RequestParameters,
}

#[derive(Debug, Serialize)]
struct RequestInput<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct RequestParameters {
    result_format: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    output: Option<ResponseOutput>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseOutput {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    /// Present instead of `choices` when `result_format` is `text`.
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl GenerationResponse {
    fn into_text(self) -> Option<String> {
        let output = self.output?;
        output
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .or(output.text)
    }
}

#[async_trait]
impl GenerativeBackend for DashScopeBackend {
    async fn generate(&self, prompt: &str) -> Result<Generation, UpstreamError> {
        let body = GenerationRequest {
            model: &self.config.model,
            input: RequestInput { prompt },
            parameters: RequestParameters {
                result_format: "message",
            },
        };

        tracing::info!(
            model = %self.config.model,
            prompt_chars = prompt.chars().count(),
            "calling generative backend"
        );
        let started = Instant::now();

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::transport(format!(
                        "generation timed out after {}s",
                        self.config.timeout.as_secs()
                    ))
                } else {
                    UpstreamError::transport(format!("generation request failed: {e}"))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(format!("reading generation response: {e}")))?;
        let parsed: GenerationResponse = serde_json::from_str(&text).unwrap_or_default();

        tracing::info!(
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generative backend responded"
        );

        if !status.is_success() {
            let message = parsed.message.unwrap_or(text);
            tracing::warn!(
                status = status.as_u16(),
                code = ?parsed.code,
                %message,
                "generation failed"
            );
            return Ok(Generation::failed(status.as_u16(), parsed.code, message));
        }

        match parsed.into_text() {
            Some(content) => {
                tracing::debug!(content_chars = content.chars().count(), "generation content");
                Ok(Generation::ok(content))
            }
            None => Err(UpstreamError::CallFailed {
                status: Some(status.as_u16()),
                code: None,
                message: "response carries no generated content".to_string(),
            }),
        }
    }
}

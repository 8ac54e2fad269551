//! External collaborators: the generative text backend and the speech
//! recognition gateway.

pub mod dashscope;
pub mod speech;

use async_trait::async_trait;

pub use dashscope::{DashScopeBackend, DashScopeConfig};
pub use speech::{SpeechClient, SpeechError};

/// Error code the generative backend uses for a moderation rejection.
pub const MODERATION_CODE: &str = "DataInspectionFailed";

/// Errors from an upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// Non-success status, transport failure, or timeout. `status` is
    /// `None` when no response arrived at all.
    #[error("upstream call failed{}: {message}", describe_status(.status, .code))]
    CallFailed {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    #[error("upstream rejected the request on content moderation: {message}")]
    ContentModerationRejected { message: String },
}

impl UpstreamError {
    /// Classify a non-success response.
    pub fn from_response(status: u16, code: Option<String>, message: String) -> Self {
        let moderated = code.as_deref() == Some(MODERATION_CODE)
            || message.to_ascii_lowercase().contains("inappropriate content");
        if moderated {
            Self::ContentModerationRejected { message }
        } else {
            Self::CallFailed {
                status: Some(status),
                code,
                message,
            }
        }
    }

    /// A failure with no response (connect error, timeout).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::CallFailed {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn is_moderation(&self) -> bool {
        matches!(self, Self::ContentModerationRejected { .. })
    }
}

fn describe_status(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code) {
        (Some(s), Some(c)) => format!(" (status {s}, code {c})"),
        (Some(s), None) => format!(" (status {s})"),
        (None, Some(c)) => format!(" (code {c})"),
        (None, None) => String::new(),
    }
}

/// The outcome of one generative call that got a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub status_code: u16,
    /// The generated text on success, the error message otherwise.
    pub content: String,
    /// Backend error code, present only on failures.
    pub code: Option<String>,
}

impl Generation {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            content: content.into(),
            code: None,
        }
    }

    pub fn failed(status_code: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            content: message.into(),
            code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// The generated text, or the classified failure.
    pub fn into_content(self) -> Result<String, UpstreamError> {
        if self.is_success() {
            Ok(self.content)
        } else {
            Err(UpstreamError::from_response(
                self.status_code,
                self.code,
                self.content,
            ))
        }
    }
}

/// A text-generation endpoint: prompt in, raw text out.
///
/// Implementations return `Ok` for every call that produced an HTTP
/// response, success or not, and `Err` only when none arrived.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generation, UpstreamError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn GenerativeBackend) {}
};

#[async_trait]
impl<T: GenerativeBackend + ?Sized> GenerativeBackend for std::sync::Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<Generation, UpstreamError> {
        (**self).generate(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_code_is_classified() {
        let err = UpstreamError::from_response(
            400,
            Some("DataInspectionFailed".to_string()),
            "Input data may contain inappropriate content.".to_string(),
        );
        assert!(err.is_moderation(), "got: {err}");
    }

    #[test]
    fn moderation_message_without_code_is_classified() {
        let err = UpstreamError::from_response(
            400,
            None,
            "Output may contain Inappropriate Content".to_string(),
        );
        assert!(err.is_moderation());
    }

    #[test]
    fn other_failures_keep_status_and_code() {
        let err = UpstreamError::from_response(
            401,
            Some("InvalidApiKey".to_string()),
            "Invalid API-key provided.".to_string(),
        );
        assert_eq!(
            err.to_string(),
            "upstream call failed (status 401, code InvalidApiKey): Invalid API-key provided."
        );
    }

    #[test]
    fn transport_failure_has_no_status() {
        assert_eq!(
            UpstreamError::transport("timed out").to_string(),
            "upstream call failed: timed out"
        );
    }

    #[test]
    fn generation_into_content() {
        assert_eq!(Generation::ok("hello").into_content().unwrap(), "hello");
        let err = Generation::failed(500, None, "boom").into_content().unwrap_err();
        assert!(matches!(err, UpstreamError::CallFailed { status: Some(500), .. }));
    }
}

use async_trait::async_trait;
use thiserror::Error;

use crate::models::event::ChatTurn;

/// How strictly the provider is asked to produce JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    JsonMode,
    PlainText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVariant {
    pub model: String,
    pub shape: RequestShape,
}

impl ModelVariant {
    pub fn new(model: impl Into<String>, shape: RequestShape) -> Self {
        Self {
            model: model.into(),
            shape,
        }
    }

    pub fn with_shape(&self, shape: RequestShape) -> Self {
        Self {
            model: self.model.clone(),
            shape,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub system_prompt: String,
    pub user_text: String,
}

impl BackendRequest {
    pub fn from_turn(turn: &ChatTurn, system_prompt: String) -> Self {
        Self {
            system_prompt,
            user_text: turn.user_text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("quota exhausted: {0}")]
    Quota(String),
    #[error("request rejected: {0}")]
    MalformedRequest(String),
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected backend response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Blocked(String),
    #[error("operation not supported by this backend")]
    Unsupported,
}

impl BackendError {
    /// Everything but a content-safety block moves the selector on to the next candidate.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, BackendError::Blocked(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn id(&self) -> &str;

    async fn send(
        &self,
        request: &BackendRequest,
        variant: &ModelVariant,
    ) -> Result<String, BackendError>;

    async fn available_models(&self) -> Result<Vec<String>, BackendError> {
        Err(BackendError::Unsupported)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(String),
    RetryableFailure(String),
    FatalFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAttemptResult {
    pub backend_id: String,
    pub outcome: AttemptOutcome,
}

impl BackendAttemptResult {
    pub fn from_result(backend_id: &str, result: Result<String, BackendError>) -> Self {
        let outcome = match result {
            Ok(raw) => AttemptOutcome::Success(raw),
            Err(err) if err.is_retryable() => AttemptOutcome::RetryableFailure(err.to_string()),
            Err(err) => AttemptOutcome::FatalFailure(err.to_string()),
        };
        Self {
            backend_id: backend_id.to_string(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_blocks_are_fatal() {
        let blocked = BackendAttemptResult::from_result(
            "gemini/gemini-2.5-flash",
            Err(BackendError::Blocked("Blocked for safety: SAFETY".to_string())),
        );
        assert_eq!(
            blocked.outcome,
            AttemptOutcome::FatalFailure("Blocked for safety: SAFETY".to_string())
        );

        let quota = BackendAttemptResult::from_result(
            "gemini/gemini-2.5-flash",
            Err(BackendError::Quota("429".to_string())),
        );
        assert!(matches!(quota.outcome, AttemptOutcome::RetryableFailure(_)));

        let ok = BackendAttemptResult::from_result("ollama", Ok("{}".to_string()));
        assert_eq!(ok.outcome, AttemptOutcome::Success("{}".to_string()));
    }
}

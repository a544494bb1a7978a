use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::models::decision::Decision;
use crate::service::backend::{
    AttemptOutcome, BackendAdapter, BackendAttemptResult, BackendError, BackendRequest,
    ModelVariant, RequestShape,
};
use crate::service::decoder::decode_decision;

#[derive(Clone)]
pub struct Candidate {
    pub adapter: Arc<dyn BackendAdapter>,
    pub variant: ModelVariant,
}

impl Candidate {
    pub fn new(adapter: Arc<dyn BackendAdapter>, variant: ModelVariant) -> Self {
        Self { adapter, variant }
    }

    fn label(&self) -> String {
        format!("{}/{}", self.adapter.id(), self.variant.model)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExhaustedDiagnostic {
    pub last_error: String,
    pub available_models: Result<Vec<String>, String>,
}

impl fmt::Display for ExhaustedDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "I could not reach any available model. Last error: {}",
            self.last_error
        )?;
        match &self.available_models {
            Ok(models) if models.is_empty() => {
                write!(f, "\n\n**Diagnostic:** the credentials work but list no models.")
            }
            Ok(models) => write!(
                f,
                "\n\n**Diagnostic:** the credentials work. Visible models: {}",
                models.join(", ")
            ),
            Err(reason) => write!(f, "\n\n**Diagnostic unavailable:** {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Decided { backend_id: String, decision: Decision },
    Blocked { backend_id: String, message: String },
    Exhausted { diagnostic: ExhaustedDiagnostic },
}

/// Walks a fixed, most-capable-first list of backends until one answers.
pub struct BackendSelector {
    candidates: Vec<Candidate>,
}

impl BackendSelector {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub async fn select(&self, request: &BackendRequest) -> Selection {
        let mut last_error = "no backends configured".to_string();
        let mut last_adapter: Option<&Arc<dyn BackendAdapter>> = None;

        for candidate in &self.candidates {
            last_adapter = Some(&candidate.adapter);
            let attempt = self.attempt(candidate, request).await;
            match attempt.outcome {
                AttemptOutcome::Success(raw) => {
                    info!(backend = %attempt.backend_id, "backend answered");
                    return Selection::Decided {
                        backend_id: attempt.backend_id,
                        decision: decode_decision(&raw),
                    };
                }
                AttemptOutcome::FatalFailure(message) => {
                    warn!(backend = %attempt.backend_id, "backend withheld its response");
                    return Selection::Blocked {
                        backend_id: attempt.backend_id,
                        message,
                    };
                }
                AttemptOutcome::RetryableFailure(reason) => {
                    warn!(backend = %attempt.backend_id, %reason, "backend failed, trying next");
                    last_error = reason;
                }
            }
        }

        let available_models = match last_adapter {
            Some(adapter) => match adapter.available_models().await {
                Ok(models) => Ok(models),
                Err(err) => {
                    warn!(backend = adapter.id(), error = %err, "model listing failed");
                    Err(err.to_string())
                }
            },
            None => Err("no backend to inspect".to_string()),
        };

        Selection::Exhausted {
            diagnostic: ExhaustedDiagnostic {
                last_error,
                available_models,
            },
        }
    }

    // A rejected JSON-mode request gets one retry with the permissive shape.
    async fn attempt(&self, candidate: &Candidate, request: &BackendRequest) -> BackendAttemptResult {
        let label = candidate.label();
        info!(backend = %label, shape = ?candidate.variant.shape, "trying backend");
        let mut result = candidate.adapter.send(request, &candidate.variant).await;

        if let Err(BackendError::MalformedRequest(reason)) = &result {
            if candidate.variant.shape == RequestShape::JsonMode {
                warn!(backend = %label, %reason, "retrying without JSON mode");
                let relaxed = candidate.variant.with_shape(RequestShape::PlainText);
                result = candidate.adapter.send(request, &relaxed).await;
            }
        }

        BackendAttemptResult::from_result(&label, result)
    }
}

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::HostOverride;
use crate::service::backend::{BackendAdapter, BackendError, BackendRequest, ModelVariant, RequestShape};

const CONTEXT_TOKENS: u32 = 32768;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagInfo>,
}

#[derive(Debug, Deserialize)]
struct TagInfo {
    name: String,
}

/// Talks to an Ollama server, usually exposed through a tunnel.
pub struct OllamaClient {
    http: reqwest::Client,
    default_host: String,
    host_override: HostOverride,
}

impl OllamaClient {
    pub fn new(http: reqwest::Client, default_host: impl Into<String>, host_override: HostOverride) -> Self {
        Self {
            http,
            default_host: default_host.into().trim_end_matches('/').to_string(),
            host_override,
        }
    }

    /// Resolved on every call so a host changed mid-session is picked up.
    pub async fn host(&self) -> String {
        self.host_override
            .current()
            .await
            .unwrap_or_else(|| self.default_host.clone())
    }
}

fn build_request<'a>(request: &'a BackendRequest, variant: &'a ModelVariant) -> ChatRequest<'a> {
    ChatRequest {
        model: &variant.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: &request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &request.user_text,
            },
        ],
        stream: false,
        format: match variant.shape {
            RequestShape::JsonMode => Some("json"),
            RequestShape::PlainText => None,
        },
        options: ChatOptions {
            temperature: 0.2,
            num_predict: CONTEXT_TOKENS,
            num_ctx: CONTEXT_TOKENS,
        },
    }
}

fn interpret_response(status: StatusCode, body: &str) -> Result<String, BackendError> {
    let parsed: Option<ChatResponse> = serde_json::from_str(body).ok();
    if !status.is_success() {
        let message = parsed
            .and_then(|p| p.error)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
        return Err(match status {
            StatusCode::TOO_MANY_REQUESTS => BackendError::Quota(message),
            StatusCode::BAD_REQUEST => BackendError::MalformedRequest(message),
            _ => BackendError::Status {
                status: status.as_u16(),
                message,
            },
        });
    }

    match parsed {
        Some(ChatResponse {
            message: Some(message),
            ..
        }) => Ok(message.content),
        Some(ChatResponse {
            error: Some(error), ..
        }) => Err(BackendError::InvalidResponse(error)),
        _ => Err(BackendError::InvalidResponse(format!("unexpected body: {}", body))),
    }
}

#[async_trait]
impl BackendAdapter for OllamaClient {
    fn id(&self) -> &str {
        "ollama"
    }

    async fn send(
        &self,
        request: &BackendRequest,
        variant: &ModelVariant,
    ) -> Result<String, BackendError> {
        let url = format!("{}/api/chat", self.host().await);
        let response = self
            .http
            .post(url)
            .header("ngrok-skip-browser-warning", "true")
            .json(&build_request(request, variant))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        interpret_response(status, &text)
    }

    async fn available_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.host().await);
        let response = self
            .http
            .get(url)
            .header("ngrok-skip-browser-warning", "true")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let tags: TagList = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

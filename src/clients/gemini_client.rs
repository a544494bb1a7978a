use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::service::backend::{BackendAdapter, BackendError, BackendRequest, ModelVariant, RequestShape};

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    models: Option<Vec<ModelInfo>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

fn build_request(request: &BackendRequest, shape: RequestShape) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: format!("{}\n\nUSER: {}", request.system_prompt, request.user_text),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: 0.2,
            max_output_tokens: 800,
            response_mime_type: match shape {
                RequestShape::JsonMode => Some("application/json"),
                RequestShape::PlainText => None,
            },
        },
    }
}

// Maps one generateContent exchange onto the adapter's failure taxonomy.
fn interpret_response(model: &str, status: StatusCode, body: &str) -> Result<String, BackendError> {
    let parsed: Option<GenerateResponse> = serde_json::from_str(body).ok();
    let api_error = parsed.as_ref().and_then(|p| p.error.as_ref());
    let message = api_error
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    let exhausted = api_error
        .and_then(|e| e.status.as_deref())
        .is_some_and(|s| s == "RESOURCE_EXHAUSTED");
    if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
        return Err(BackendError::Quota(message));
    }
    if status == StatusCode::BAD_REQUEST {
        return Err(BackendError::MalformedRequest(message));
    }
    if !status.is_success() {
        return Err(BackendError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let Some(parsed) = parsed else {
        return Err(BackendError::InvalidResponse(format!("unparsable body: {}", body)));
    };
    if parsed.candidates.is_empty() {
        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(BackendError::Blocked(format!(
                "Blocked for safety ({}): {}",
                model, reason
            )));
        }
        return Err(BackendError::InvalidResponse("no candidates returned".to_string()));
    }

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| BackendError::InvalidResponse("candidate has no text".to_string()))
}

fn interpret_model_list(body: &str) -> Result<Vec<String>, BackendError> {
    let list: ModelList = serde_json::from_str(body)
        .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
    match (list.models, list.error) {
        (Some(models), _) => Ok(models
            .into_iter()
            .map(|m| m.name.trim_start_matches("models/").to_string())
            .collect()),
        (None, Some(err)) => Err(BackendError::InvalidResponse(format!(
            "the key lists no models: {}",
            err.message.unwrap_or_default()
        ))),
        (None, None) => Ok(Vec::new()),
    }
}

#[async_trait]
impl BackendAdapter for GeminiClient {
    fn id(&self) -> &str {
        "gemini"
    }

    async fn send(
        &self,
        request: &BackendRequest,
        variant: &ModelVariant,
    ) -> Result<String, BackendError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, variant.model);
        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_request(request, variant.shape))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        interpret_response(&variant.model, status, &text)
    }

    async fn available_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let response = self
            .http
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        let text = response.text().await?;
        interpret_model_list(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_mode_sets_mime_type() {
        let request = BackendRequest {
            system_prompt: "sys".to_string(),
            user_text: "hi".to_string(),
        };
        let json = serde_json::to_value(build_request(&request, RequestShape::JsonMode)).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "sys\n\nUSER: hi");

        let json = serde_json::to_value(build_request(&request, RequestShape::PlainText)).unwrap();
        assert!(json["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn extracts_candidate_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"response_text\":\"ok\"}"}]}}]}"#;
        let text = interpret_response("gemini-2.5-flash", StatusCode::OK, body).unwrap();
        assert_eq!(text, r#"{"response_text":"ok"}"#);
    }

    #[test]
    fn classifies_quota() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = interpret_response("m", StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert_eq!(err, BackendError::Quota("Quota exceeded".to_string()));

        let err = interpret_response("m", StatusCode::FORBIDDEN, body).unwrap_err();
        assert!(matches!(err, BackendError::Quota(_)));
    }

    #[test]
    fn classifies_bad_request_and_other_statuses() {
        let body = r#"{"error":{"message":"JSON mode is not enabled for models/gemini-pro"}}"#;
        let err = interpret_response("gemini-pro", StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, BackendError::MalformedRequest(_)));

        let err = interpret_response("m", StatusCode::NOT_FOUND, "not json").unwrap_err();
        assert_eq!(
            err,
            BackendError::Status {
                status: 404,
                message: "Not Found".to_string()
            }
        );
    }

    #[test]
    fn safety_block_is_reported() {
        let body = r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = interpret_response("gemini-2.0-flash", StatusCode::OK, body).unwrap_err();
        assert_eq!(
            err,
            BackendError::Blocked("Blocked for safety (gemini-2.0-flash): SAFETY".to_string())
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_candidates_without_block_is_retryable() {
        let err = interpret_response("m", StatusCode::OK, "{}").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn lists_models_without_prefix() {
        let body = r#"{"models":[{"name":"models/gemini-2.0-flash"},{"name":"models/gemma-3"}]}"#;
        assert_eq!(
            interpret_model_list(body).unwrap(),
            vec!["gemini-2.0-flash".to_string(), "gemma-3".to_string()]
        );
        let body = r#"{"error":{"message":"API key not valid"}}"#;
        assert!(interpret_model_list(body).is_err());
    }
}

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::clients::gemini_client::GeminiClient;
use crate::clients::google_calendar_client::GoogleCalendarClient;
use crate::clients::ollama_client::OllamaClient;
use crate::config::{BackendKind, ConfigError, HostOverride, Settings};
use crate::events::queue::EventBus;
use crate::events::worker::run_event_worker;
use crate::handlers::action::ActionExecutor;
use crate::handlers::chat::ChatOrchestrator;
use crate::service::backend::{ModelVariant, RequestShape};
use crate::service::calendar::CalendarClient;
use crate::service::context_builder::ContextBuilder;
use crate::service::notifier::Notifier;
use crate::service::selector::{BackendSelector, Candidate};

pub fn http_client(settings: &Settings) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()
        .map_err(|e| ConfigError::InvalidValue {
            key: "HTTP_TIMEOUT_SECS",
            value: e.to_string(),
        })
}

pub fn calendar_client(
    settings: &Settings,
    http: reqwest::Client,
) -> Result<Arc<dyn CalendarClient>, ConfigError> {
    let token = settings
        .calendar_token
        .clone()
        .ok_or(ConfigError::Missing("GOOGLE_CALENDAR_TOKEN"))?;
    Ok(Arc::new(GoogleCalendarClient::new(
        http,
        settings.calendar_base_url.clone(),
        token,
        settings.timezone,
    )))
}

/// Expands the configured backend order into the flat candidate list.
pub fn backend_candidates(settings: &Settings, http: reqwest::Client) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for kind in &settings.backends {
        match kind {
            BackendKind::Ollama => {
                let client = Arc::new(OllamaClient::new(
                    http.clone(),
                    settings.ollama_host.clone(),
                    HostOverride::new(settings.ollama_host_file.clone()),
                ));
                candidates.push(Candidate::new(
                    client,
                    ModelVariant::new(settings.ollama_model.clone(), RequestShape::JsonMode),
                ));
            }
            BackendKind::Gemini => {
                let Some(api_key) = settings.gemini_api_key.clone() else {
                    warn!("GEMINI_API_KEY not set, skipping gemini backend");
                    continue;
                };
                let client = Arc::new(GeminiClient::new(
                    http.clone(),
                    settings.gemini_base_url.clone(),
                    api_key,
                ));
                for variant in &settings.gemini_models {
                    candidates.push(Candidate::new(client.clone(), variant.clone()));
                }
            }
        }
    }
    candidates
}

pub fn build_orchestrator(
    settings: &Settings,
    calendar: Arc<dyn CalendarClient>,
    notifier: Arc<dyn Notifier>,
    http: reqwest::Client,
) -> ChatOrchestrator {
    ChatOrchestrator::new(
        ContextBuilder::new(calendar.clone()),
        BackendSelector::new(backend_candidates(settings, http)),
        ActionExecutor::new(calendar, notifier.clone()),
        notifier,
        settings.timezone,
    )
}

pub fn spawn_chat_worker(orchestrator: ChatOrchestrator) -> (EventBus, JoinHandle<()>) {
    let (bus, rx) = EventBus::new(1);
    let handle = tokio::spawn(run_event_worker(rx, orchestrator));
    (bus, handle)
}

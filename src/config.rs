use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

use crate::service::backend::{ModelVariant, RequestShape};

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3-coder:480b-cloud";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_HOST_FILE: &str = "./data/ollama_host";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config line {line}: {content}")]
    InvalidLine { line: usize, content: String },
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine {
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    /// Config file value first, then the process environment.
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .get(key)
            .cloned()
            .or_else(|| env::var(key).ok())
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    Gemini,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub backends: Vec<BackendKind>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_models: Vec<ModelVariant>,
    pub ollama_host: String,
    pub ollama_model: String,
    pub ollama_host_file: PathBuf,
    pub calendar_token: Option<String>,
    pub calendar_base_url: String,
    pub timezone: Tz,
    pub http_timeout: Duration,
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let backends = match config.get("BACKENDS") {
            Some(raw) => parse_backends(&raw)?,
            None => vec![BackendKind::Ollama, BackendKind::Gemini],
        };
        let gemini_models = match config.get("GEMINI_MODELS") {
            Some(raw) => parse_model_list(&raw),
            None => default_gemini_models(),
        };
        let timezone = match config.get("TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|_| ConfigError::InvalidValue {
                key: "TIMEZONE",
                value: name,
            })?,
            None => Tz::UTC,
        };
        let http_timeout = match config.get("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: "HTTP_TIMEOUT_SECS",
                    value: raw,
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self {
            backends,
            gemini_api_key: config.get("GEMINI_API_KEY"),
            gemini_base_url: config
                .get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            gemini_models,
            ollama_host: config
                .get("OLLAMA_HOST")
                .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            ollama_model: config
                .get("OLLAMA_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            ollama_host_file: config
                .get("OLLAMA_HOST_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HOST_FILE)),
            calendar_token: config.get("GOOGLE_CALENDAR_TOKEN"),
            calendar_base_url: config
                .get("CALENDAR_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CALENDAR_BASE_URL.to_string()),
            timezone,
            http_timeout,
        })
    }
}

fn parse_backends(raw: &str) -> Result<Vec<BackendKind>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| match name.to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "gemini" => Ok(BackendKind::Gemini),
            _ => Err(ConfigError::InvalidValue {
                key: "BACKENDS",
                value: name.to_string(),
            }),
        })
        .collect()
}

// "gemini-pro:text" selects the permissive request shape for that model.
fn parse_model_list(raw: &str) -> Vec<ModelVariant> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.strip_suffix(":text") {
            Some(model) => ModelVariant::new(model, RequestShape::PlainText),
            None => ModelVariant::new(entry, RequestShape::JsonMode),
        })
        .collect()
}

/// Most capable first; the legacy model does not accept JSON mode.
pub fn default_gemini_models() -> Vec<ModelVariant> {
    vec![
        ModelVariant::new("gemini-2.5-flash", RequestShape::JsonMode),
        ModelVariant::new("gemini-2.0-flash", RequestShape::JsonMode),
        ModelVariant::new("gemini-1.5-pro", RequestShape::JsonMode),
        ModelVariant::new("gemini-1.5-flash", RequestShape::JsonMode),
        ModelVariant::new("gemini-pro", RequestShape::PlainText),
    ]
}

/// User-chosen backend address, persisted to a one-line file and read on every call.
#[derive(Debug, Clone)]
pub struct HostOverride {
    path: PathBuf,
}

impl HostOverride {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn current(&self) -> Option<String> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        let host = content.trim().trim_end_matches('/');
        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }

    pub async fn persist(&self, host: &str) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }
        tokio::fs::write(&self.path, format!("{}\n", host.trim()))
            .await
            .map_err(io_err)
    }

    pub async fn clear(&self) -> Result<(), ConfigError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ConfigError::Io {
                path: self.path.display().to_string(),
                source,
            }),
        }
    }
}

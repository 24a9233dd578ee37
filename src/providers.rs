use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::{NamerError, Result};
use crate::image_asset::{Payload, TransmitFormat};
use crate::naming::strip_think_tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    OpenAI,
}

impl BackendKind {
    /// `--use-openai` forces the hosted backend; a configured hosted model
    /// implies it; otherwise the local server is used.
    pub fn select(config: &Config, use_openai: bool) -> Self {
        if use_openai || config.openai_model.is_some() {
            BackendKind::OpenAI
        } else {
            BackendKind::Ollama
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Ollama => write!(f, "Ollama"),
            BackendKind::OpenAI => write!(f, "OpenAI"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OllamaBackend {
    endpoint: String,
    model: String,
}

#[derive(Debug, Clone)]
pub struct OpenAIBackend {
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Clone)]
pub enum Backend {
    Ollama(OllamaBackend),
    OpenAI(OpenAIBackend),
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// Sends one image + prompt to the selected backend and returns its text.
#[derive(Debug, Clone)]
pub struct ModelClient {
    http: Client,
    backend: Backend,
}

impl ModelClient {
    pub fn new(config: &Config, kind: BackendKind) -> Result<Self> {
        let backend = match kind {
            BackendKind::Ollama => Backend::Ollama(OllamaBackend {
                endpoint: config.ollama_host.trim_end_matches('/').to_string(),
                model: config.local_model.clone(),
            }),
            BackendKind::OpenAI => {
                let api_key = config.openai_api_key.clone().ok_or_else(|| {
                    NamerError::Configuration(
                        "hosted mode needs an API key: set AISN_OPENAI_API_KEY".to_string(),
                    )
                })?;
                Backend::OpenAI(OpenAIBackend {
                    base_url: config.openai_base_url.trim_end_matches('/').to_string(),
                    api_key,
                    model: config.hosted_model().to_string(),
                })
            }
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NamerError::Configuration(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { http, backend })
    }

    pub fn from_config(config: &Config, use_openai: bool) -> Result<Self> {
        Self::new(config, BackendKind::select(config, use_openai))
    }

    pub fn kind(&self) -> BackendKind {
        match self.backend {
            Backend::Ollama(_) => BackendKind::Ollama,
            Backend::OpenAI(_) => BackendKind::OpenAI,
        }
    }

    pub fn get_model_name(&self) -> &str {
        match &self.backend {
            Backend::Ollama(b) => &b.model,
            Backend::OpenAI(b) => &b.model,
        }
    }

    pub fn endpoint(&self) -> &str {
        match &self.backend {
            Backend::Ollama(b) => &b.endpoint,
            Backend::OpenAI(b) => &b.base_url,
        }
    }

    /// The local server reads files in any format it knows; hosted APIs get a
    /// bounded WebP to keep the upload small.
    pub fn transmit_format(&self) -> TransmitFormat {
        match self.backend {
            Backend::Ollama(_) => TransmitFormat::Original,
            Backend::OpenAI(_) => TransmitFormat::WebP,
        }
    }

    pub async fn suggest_name(&self, image: &Payload, prompt: &str) -> Result<String> {
        let raw = match &self.backend {
            Backend::Ollama(backend) => self.ollama_chat(backend, image, prompt).await?,
            Backend::OpenAI(backend) => self.openai_chat(backend, image, prompt).await?,
        };

        debug!(response = %raw, "model response");

        let suggestion = strip_think_tags(&raw).trim().to_string();
        if suggestion.is_empty() {
            return Err(NamerError::EmptySuggestion);
        }
        Ok(suggestion)
    }

    async fn ollama_chat(&self, backend: &OllamaBackend, image: &Payload, prompt: &str) -> Result<String> {
        let body = json!({
            "model": backend.model,
            "stream": false,
            "messages": [{
                "role": "user",
                "content": prompt,
                "images": [image.to_base64()],
            }],
        });

        let url = format!("{}/api/chat", backend.endpoint);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NamerError::unavailable(&backend.endpoint, e))?;

        let text = Self::read_success_body(&backend.endpoint, resp).await?;
        let parsed: OllamaChatResponse =
            serde_json::from_str(&text).map_err(|_| NamerError::EmptySuggestion)?;

        parsed
            .message
            .and_then(|m| m.content)
            .ok_or(NamerError::EmptySuggestion)
    }

    async fn openai_chat(&self, backend: &OpenAIBackend, image: &Payload, prompt: &str) -> Result<String> {
        let body = json!({
            "model": backend.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                },
                {
                    "role": "user",
                    "content": [{
                        "type": "image_url",
                        "image_url": { "url": image.data_url() },
                    }],
                },
            ],
        });

        let url = format!("{}/chat/completions", backend.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&backend.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NamerError::unavailable(&backend.base_url, e))?;

        let text = Self::read_success_body(&backend.base_url, resp).await?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|_| NamerError::EmptySuggestion)?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(NamerError::EmptySuggestion)
    }

    async fn read_success_body(endpoint: &str, resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| NamerError::unavailable(endpoint, e))?;

        if !status.is_success() {
            let detail: String = text.trim().chars().take(200).collect();
            return Err(NamerError::unavailable(
                endpoint,
                format!("HTTP {}: {}", status.as_u16(), detail),
            ));
        }
        Ok(text)
    }
}

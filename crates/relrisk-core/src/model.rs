//! OpenAI-compatible chat completion client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::capability::{ModelClient, RenderedPrompt};
use crate::domain::ModelError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub const AUTH_ENV_VAR: &str = "OPENAI_API_KEY";
pub const MODEL_ENV_VAR: &str = "RELRISK_MODEL";
pub const BASE_URL_ENV_VAR: &str = "RELRISK_MODEL_BASE_URL";

/// Connection and sampling settings for the model endpoint.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing, default)]
    pub api_key: String,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.1,
            max_tokens: 2_048,
            api_key: api_key.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Read `OPENAI_API_KEY`, `RELRISK_MODEL` and `RELRISK_MODEL_BASE_URL`.
    pub fn from_env() -> Result<Self, ModelError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ModelConfig::from_env`] with an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ModelError> {
        let api_key = lookup(AUTH_ENV_VAR)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ModelError::InvalidConfig {
                message: format!("missing {AUTH_ENV_VAR}"),
            })?;
        let mut config = Self::new(api_key);
        if let Some(model) = lookup(MODEL_ENV_VAR).filter(|m| !m.trim().is_empty()) {
            config.model = model;
        }
        if let Some(url) = lookup(BASE_URL_ENV_VAR).filter(|u| !u.trim().is_empty()) {
            config.base_url = url;
        }
        Ok(config)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// `ModelClient` backed by an OpenAI-style `/chat/completions` endpoint.
///
/// Requests JSON-object output. Timeouts are enforced by the assessor.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    config: ModelConfig,
    client: reqwest::Client,
}

impl OpenAiChatClient {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn request_body(&self, prompt: &RenderedPrompt) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": { "type": "json_object" },
        })
    }
}

/// Map a non-success HTTP status to a model error.
pub fn status_error(status: u16, body: String) -> ModelError {
    if status == 429 {
        ModelError::RateLimited
    } else {
        ModelError::Api { status, body }
    }
}

/// Pull `choices[0].message.content` out of a chat completion body.
pub fn extract_content(body: &Value) -> Result<String, ModelError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or(ModelError::EmptyResponse)
}

#[async_trait]
impl ModelClient for OpenAiChatClient {
    async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, ModelError> {
        let url = self.config.endpoint();
        tracing::debug!(model = %self.config.model, url = %url, "sending chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| ModelError::Transport {
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let body: Value = resp.json().await.map_err(|e| ModelError::Transport {
            message: format!("invalid response body: {e}"),
        })?;
        extract_content(&body)
    }
}

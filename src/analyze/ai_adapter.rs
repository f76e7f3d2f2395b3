//! AI adapter: provider abstraction + OpenAI-compatible chat completions.
//!
//! The classifier and digest composer only see the `LanguageModel` trait, so tests can
//! script responses without a network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors a model call can end with. Callers degrade on all of them.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection, timeout or TLS failure.
    #[error("model request failed: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success status.
    #[error("model API error (status {status}): {body}")]
    Status { status: u16, body: String },

    /// Response decoded fine but carried no text.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// Response body was not the expected envelope.
    #[error("could not decode model response: {0}")]
    Decode(String),
}

/// JSON schema request for structured output.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub user: String,
    pub schema: Option<ResponseSchema>,
    pub temperature: f32,
}

impl ChatRequest {
    /// Plain single-turn request.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            user: prompt.into(),
            schema: None,
            temperature: 0.0,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the raw assistant text.
    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError>;
    /// Model name for diagnostics.
    fn name(&self) -> &str;
}

/// Convenient alias used by callers.
pub type DynModel = Arc<dyn LanguageModel>;

/// OpenAI-compatible provider (Chat Completions API).
pub struct OpenAiChat {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("market-news-agent/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenAiChat {
    async fn complete(&self, req: ChatRequest) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = req.system.as_deref() {
            messages.push(Msg {
                role: "system",
                content: sys,
            });
        }
        messages.push(Msg {
            role: "user",
            content: &req.user,
        });

        let response_format = req.schema.as_ref().map(|s| {
            serde_json::json!({
                "type": "json_schema",
                "json_schema": { "name": s.name, "strict": true, "schema": s.schema }
            })
        });

        let body = Req {
            model: &self.model,
            messages,
            temperature: req.temperature,
            response_format,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: crate::ingest::truncate_chars(&text, 300),
            });
        }

        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

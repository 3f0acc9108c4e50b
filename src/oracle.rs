//! Oracle transport: the injected capability that turns prompts into text.
//!
//! The pipeline never talks HTTP directly — it holds an
//! `Arc<dyn OracleTransport>` and calls two methods: a system+user chat for
//! the initial extraction and a single-prompt call for corrective retries.
//! Modelling the oracle as a strategy trait keeps the pipeline testable with
//! a scripted mock and lets deployments swap OpenRouter for any
//! chat-completions-compatible endpoint (vLLM, Ollama, LiteLLM) by changing
//! the base URL.

use crate::config::PipelineConfig;
use crate::error::OracleError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Text-in, text-out capability backing the extraction client.
#[async_trait::async_trait]
pub trait OracleTransport: Send + Sync {
    /// Full extraction call: fixed instruction plus one data message.
    async fn invoke(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, OracleError>;

    /// Single-message call used for corrective retries.
    async fn invoke_simple(&self, prompt: &str) -> Result<String, OracleError>;
}

/// OpenRouter (or any OpenAI-compatible) chat-completions transport.
pub struct OpenRouterTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenRouterTransport {
    /// Build a transport from the pipeline configuration.
    ///
    /// The request timeout comes from `config.api_timeout_secs` — oracle
    /// calls are the pipeline's only unbounded-latency suspension points, so
    /// they must not hang a run forever.
    pub fn new(config: &PipelineConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, OracleError> {
        // The response_format hint asks for JSON where the backend supports
        // it; the parser must still cope with backends that ignore it.
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(OracleError::MissingContent)?;

        debug!("Oracle returned {} chars", content.len());
        Ok(content)
    }
}

#[async_trait::async_trait]
impl OracleTransport for OpenRouterTransport {
    async fn invoke(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, OracleError> {
        self.chat(vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(user_prompt),
        ])
        .await
    }

    async fn invoke_simple(&self, prompt: &str) -> Result<String, OracleError> {
        self.chat(vec![ChatMessage::user(prompt)]).await
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

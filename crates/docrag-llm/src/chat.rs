use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docrag_core::config::GenerationSettings;
use docrag_core::retry::RetryPolicy;
use docrag_core::traits::Generator;
use docrag_core::types::ChatMessage;
use docrag_core::{Error, Result};

use crate::http::{build_client, endpoint, post_json};

const BACKEND: &str = "chat";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
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

/// Non-streaming chat completions against an OpenAI-compatible endpoint.
pub struct ChatGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    policy: RetryPolicy,
}

impl ChatGenerator {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client(policy.timeout)?,
            url: endpoint(base_url, "chat/completions"),
            model: model.into(),
            api_key,
            temperature: 0.2,
            max_tokens: 512,
            policy,
        })
    }

    pub fn from_settings(settings: &GenerationSettings, policy: RetryPolicy) -> Result<Self> {
        let api_key = settings.resolved_api_key();
        if api_key.is_none() {
            tracing::warn!(env = %settings.api_key_env, "no generation API key configured, sending unauthenticated requests");
        }
        Ok(Self::new(&settings.base_url, settings.model.clone(), api_key, policy)?
            .with_sampling(settings.temperature, settings.max_tokens))
    }

    #[must_use]
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    async fn complete_once(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };
        let response: ChatResponse =
            post_json(&self.client, BACKEND, &self.url, self.api_key.as_deref(), &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::parse(BACKEND, "response has no choices"))?
            .message
            .content
            .ok_or_else(|| Error::parse(BACKEND, "choice has no message content"))
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(model = %self.model, messages = messages.len(), "requesting chat completion");
        self.policy.run(BACKEND, || self.complete_once(messages)).await
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docrag_core::config::EmbeddingSettings;
use docrag_core::retry::RetryPolicy;
use docrag_core::traits::Embedder;
use docrag_core::{Error, Result};

use crate::http::{build_client, endpoint, post_json};

const BACKEND: &str = "embeddings";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Remote embeddings via `POST {base_url}/embeddings`.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    policy: RetryPolicy,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>, policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client(policy.timeout)?,
            url: endpoint(base_url, "embeddings"),
            model: model.into(),
            api_key,
            policy,
        })
    }

    pub fn from_settings(settings: &EmbeddingSettings, policy: RetryPolicy) -> Result<Self> {
        Self::new(&settings.base_url, settings.model.clone(), settings.resolved_api_key(), policy)
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest { model: &self.model, input: text };
        let response: EmbeddingResponse =
            post_json(&self.client, BACKEND, &self.url, self.api_key.as_deref(), &request).await?;
        let vector = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::parse(BACKEND, "response has no embedding data"))?
            .embedding;
        if vector.is_empty() {
            return Err(Error::parse(BACKEND, "empty embedding vector"));
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.policy.run(BACKEND, || self.embed_once(text)).await
    }
}

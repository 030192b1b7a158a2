use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ChatMessage;

/// Turns a file into plain text.
pub trait DocumentReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<String>;
}

/// Maps text to a fixed-length vector.
///
/// The same embedder (same `model_id`) must be used for ingestion and queries;
/// the vector index records the id and rejects a mismatch.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model, e.g. `sentence-transformers/all-MiniLM-L6-v2`.
    fn model_id(&self) -> &str;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Chat-style text generation.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

use std::sync::Arc;

use docrag_core::traits::Embedder;
use docrag_core::types::RetrievalResult;
use docrag_core::Result;
use docrag_vector::VectorIndex;

/// Embeds a question with the ingestion embedder and looks up its nearest chunks.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        self.index.verify_embedder(self.embedder.model_id()).await?;
        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.query(&embedding, k).await?;
        tracing::debug!(k, hits = hits.len(), top = hits.first().map(|h| h.score), "retrieved");
        Ok(hits)
    }
}

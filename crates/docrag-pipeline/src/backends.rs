//! Construct collaborators from typed settings.

use std::sync::Arc;

use docrag_core::config::{EmbeddingProvider, Settings};
use docrag_core::reader::FileReader;
use docrag_core::traits::{Embedder, Generator};
use docrag_core::Result;
use docrag_embed::{BertEmbedder, HashingEmbedder};
use docrag_llm::{ChatGenerator, HttpEmbedder};
use docrag_vector::VectorIndex;

use crate::answer::GroundedAnswerer;
use crate::ingest::IngestionPipeline;
use crate::rag::Rag;
use crate::retriever::Retriever;

pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let embedding = &settings.embedding;
    let embedder: Arc<dyn Embedder> = match embedding.provider {
        EmbeddingProvider::Local => Arc::new(BertEmbedder::load(
            embedding.model.clone(),
            &embedding.resolved_model_dir(),
            embedding.max_len,
        )?),
        EmbeddingProvider::Http => {
            Arc::new(HttpEmbedder::from_settings(embedding, settings.backend.retry_policy())?)
        }
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(embedding.dimension)?),
    };
    tracing::info!(provider = ?embedding.provider, model = embedder.model_id(), "embedder ready");
    Ok(embedder)
}

pub fn build_generator(settings: &Settings) -> Result<Arc<dyn Generator>> {
    Ok(Arc::new(ChatGenerator::from_settings(&settings.generation, settings.backend.retry_policy())?))
}

pub async fn open_index(settings: &Settings) -> Result<Arc<VectorIndex>> {
    let index = VectorIndex::open(&settings.store.resolved_path(), &settings.store.collection).await?;
    Ok(Arc::new(index))
}

pub fn ingestion_pipeline(settings: &Settings, embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> IngestionPipeline {
    IngestionPipeline::new(Arc::new(FileReader::new()), embedder, index, settings.chunking)
}

pub fn rag(settings: &Settings, embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>, generator: Arc<dyn Generator>) -> Rag {
    Rag::new(Retriever::new(embedder, index), GroundedAnswerer::new(generator), settings.retrieval.k)
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, Stream, StreamExt};

use docrag_core::chunker::{chunk_document, ChunkingConfig};
use docrag_core::reader::document_name;
use docrag_core::traits::{DocumentReader, Embedder};
use docrag_core::types::{ChunkId, IndexEntry};
use docrag_core::{Error, Result};
use docrag_vector::VectorIndex;

/// Entries buffered before one write to the index.
const INSERT_BATCH: usize = 64;

/// Outcome of ingesting one document that could be read and chunked.
///
/// `ids` are the chunks actually stored. When embedding or insertion fails
/// partway, the stored prefix stays in the index, `failure` holds the cause and
/// `chunk_count() < attempted`.
#[derive(Debug)]
pub struct Ingestion {
    pub document: String,
    pub ids: Vec<ChunkId>,
    pub attempted: usize,
    pub failure: Option<Error>,
}

impl Ingestion {
    pub fn chunk_count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.ids.len() == self.attempted
    }
}

/// Per-document result of a batch run.
#[derive(Debug)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub outcome: Result<Ingestion>,
}

impl DocumentReport {
    pub fn is_complete(&self) -> bool {
        self.outcome.as_ref().is_ok_and(Ingestion::is_complete)
    }
}

/// Read, chunk, embed and index documents.
pub struct IngestionPipeline {
    reader: Arc<dyn DocumentReader>,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    pub fn new(
        reader: Arc<dyn DocumentReader>,
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self { reader, embedder, index, chunking }
    }

    /// Ingest one document.
    ///
    /// Read and format errors, and an embedder that does not match the
    /// collection, are returned as `Err` before anything is written. Failures
    /// after the first write are reported inside the `Ingestion`.
    pub async fn ingest(&self, path: &Path) -> Result<Ingestion> {
        let start = Instant::now();
        let document = document_name(path);
        let text = self.reader.read(path)?;
        let chunks = chunk_document(&document, &text, &self.chunking);
        let attempted = chunks.len();
        if chunks.is_empty() {
            tracing::warn!(document = %document, "document has no text, nothing to index");
            return Ok(Ingestion { document, ids: Vec::new(), attempted, failure: None });
        }
        self.index.ensure_embedder(self.embedder.model_id()).await?;

        let mut ids = Vec::with_capacity(attempted);
        let mut pending: Vec<IndexEntry> = Vec::with_capacity(INSERT_BATCH);
        let mut failure = None;
        for chunk in chunks {
            let embedding = match self.embedder.embed(&chunk.text).await {
                Ok(v) => v,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            tracing::debug!(document = %document, chunk = chunk.sequence_index, "embedded chunk");
            pending.push(IndexEntry { metadata: chunk.metadata(), id: chunk.id, embedding, text: chunk.text });
            if pending.len() >= INSERT_BATCH {
                if let Err(e) = self.flush(&mut pending, &mut ids).await {
                    failure = Some(e);
                    break;
                }
            }
        }
        if !pending.is_empty() {
            // keep what was embedded before a failure
            if let Err(e) = self.flush(&mut pending, &mut ids).await {
                failure.get_or_insert(e);
            }
        }

        match &failure {
            None => tracing::info!(
                document = %document,
                chunks = ids.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "ingested document"
            ),
            Some(e) => tracing::warn!(
                document = %document,
                stored = ids.len(),
                attempted,
                error = %e,
                "ingestion incomplete"
            ),
        }
        Ok(Ingestion { document, ids, attempted, failure })
    }

    async fn flush(&self, pending: &mut Vec<IndexEntry>, ids: &mut Vec<ChunkId>) -> Result<()> {
        self.index.upsert(pending.as_slice()).await?;
        ids.extend(pending.drain(..).map(|e| e.id));
        Ok(())
    }

    /// Ingest documents with up to `concurrency` in flight, yielding reports in input order.
    ///
    /// A failing document never stops the others.
    pub fn ingest_stream<'a>(
        &'a self,
        paths: &'a [PathBuf],
        concurrency: usize,
    ) -> impl Stream<Item = DocumentReport> + 'a {
        stream::iter(paths)
            .map(move |path| async move {
                let outcome = self.ingest(path).await;
                if let Err(e) = &outcome {
                    tracing::warn!(path = %path.display(), error = %e, "document skipped");
                }
                DocumentReport { path: path.clone(), outcome }
            })
            .buffered(concurrency.max(1))
    }

    pub async fn ingest_batch(&self, paths: &[PathBuf], concurrency: usize) -> Vec<DocumentReport> {
        self.ingest_stream(paths, concurrency).collect().await
    }
}

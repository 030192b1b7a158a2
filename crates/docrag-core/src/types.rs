//! Domain types shared by the chunker, the vector index and the answer pipeline.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Derive the stable id of a chunk from its document and position.
///
/// Re-processing a document with the same chunking parameters yields the same
/// ids, so re-ingestion overwrites instead of duplicating.
pub fn chunk_id(source: &str, sequence_index: usize) -> ChunkId {
    format!("{source}_chunk_{sequence_index}")
}

/// A window of a source document, the unit of embedding and retrieval.
///
/// - `id`: derived from `(source, sequence_index)`, see [`chunk_id`]
/// - `source`: document name (file basename)
/// - `sequence_index`: zero-based, gap-free position within the document
/// - `text`: non-empty, whitespace-trimmed window text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source: String,
    pub sequence_index: usize,
    pub text: String,
}

impl Chunk {
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata { source: self.source.clone(), sequence_index: self.sequence_index }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub sequence_index: usize,
}

impl ChunkMetadata {
    /// Citation label, e.g. `doc.txt (chunk 3)`.
    pub fn label(&self) -> String {
        format!("{} (chunk {})", self.source, self.sequence_index)
    }
}

/// A row of the vector index. `id` equals the originating `Chunk::id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: ChunkId,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
    pub text: String,
}

/// One ranked hit. Higher `score` is always more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub score: f32,
}

/// Hits ordered by descending score, at most `k` long.
pub type RetrievalResult = Vec<ScoredEntry>;

/// Assembled evidence for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub text: String,
    pub sources: Vec<String>,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

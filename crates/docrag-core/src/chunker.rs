//! Fixed-size sliding-window chunker.
//!
//! Newlines are collapsed to spaces once for the whole document, then a window
//! of `chunk_size` characters advances by `chunk_size - chunk_overlap` until it
//! passes the end of the text. Windows are trimmed; empty ones are dropped and
//! do not consume a sequence index.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{chunk_id, Chunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkingConfig", into = "RawChunkingConfig")]
pub struct ChunkingConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
struct RawChunkingConfig {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for RawChunkingConfig {
    fn default() -> Self {
        ChunkingConfig::default().into()
    }
}

impl ChunkingConfig {
    /// Fails with `InvalidConfig` unless `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn chunk_overlap(&self) -> usize { self.chunk_overlap }

    pub fn stride(&self) -> usize { self.chunk_size - self.chunk_overlap }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 100 }
    }
}

impl TryFrom<RawChunkingConfig> for ChunkingConfig {
    type Error = Error;

    fn try_from(raw: RawChunkingConfig) -> Result<Self> {
        Self::new(raw.chunk_size, raw.chunk_overlap)
    }
}

impl From<ChunkingConfig> for RawChunkingConfig {
    fn from(c: ChunkingConfig) -> Self {
        Self { chunk_size: c.chunk_size, chunk_overlap: c.chunk_overlap }
    }
}

/// A raw window before trimming. Offsets are in characters of the normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Collapse line breaks to spaces and trim the ends.
pub fn normalize(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}

/// All windows over `normalize(text)`, untrimmed and including blank ones.
pub fn windows(text: &str, config: &ChunkingConfig) -> Vec<TextWindow> {
    let chars: Vec<char> = normalize(text).chars().collect();
    let stride = config.stride();
    let mut out = Vec::with_capacity(chars.len() / stride + 1);
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        out.push(TextWindow { start, end, text: chars[start..end].iter().collect() });
        start += stride;
    }
    out
}

/// Split `text` into trimmed, non-empty window texts.
pub fn chunk(text: &str, config: &ChunkingConfig) -> Vec<String> {
    windows(text, config)
        .into_iter()
        .filter_map(|w| {
            let trimmed = w.text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

/// Chunk a whole document, assigning sequence indices and stable ids.
pub fn chunk_document(source: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    chunk(text, config)
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| Chunk {
            id: chunk_id(source, sequence_index),
            source: source.to_string(),
            sequence_index,
            text,
        })
        .collect()
}

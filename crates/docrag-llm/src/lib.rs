//! HTTP backends speaking the OpenAI-compatible wire format:
//! `/chat/completions` for generation and `/embeddings` for vectors.

pub mod chat;
pub mod embeddings;
pub mod http;

pub use chat::ChatGenerator;
pub use embeddings::HttpEmbedder;

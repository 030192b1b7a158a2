//! Retrieval-augmented answering over a local document collection.
//!
//! `IngestionPipeline` turns files into indexed chunks, `Retriever` finds the
//! chunks closest to a question, `context::assemble` merges them into cited
//! evidence and `GroundedAnswerer` asks the generator to answer from that
//! evidence alone. `Rag` wires the query half together.

pub mod answer;
pub mod backends;
pub mod context;
pub mod ingest;
pub mod rag;
pub mod retriever;

pub use answer::{GroundedAnswerer, REFUSAL};
pub use context::assemble;
pub use ingest::{DocumentReport, Ingestion, IngestionPipeline};
pub use rag::Rag;
pub use retriever::Retriever;

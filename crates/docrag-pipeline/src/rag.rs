use docrag_core::types::{Answer, Context};
use docrag_core::Result;

use crate::answer::GroundedAnswerer;
use crate::context::assemble;
use crate::retriever::Retriever;

/// Question answering over one collection: retrieve, assemble, answer.
pub struct Rag {
    retriever: Retriever,
    answerer: GroundedAnswerer,
    k: usize,
}

impl Rag {
    pub fn new(retriever: Retriever, answerer: GroundedAnswerer, k: usize) -> Self {
        Self { retriever, answerer, k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Retrieved evidence only, without calling the generator.
    pub async fn search(&self, question: &str, k: usize) -> Result<Context> {
        let hits = self.retriever.retrieve(question, k).await?;
        Ok(assemble(&hits))
    }

    pub async fn ask(&self, question: &str) -> Result<Answer> {
        self.ask_with_k(question, self.k).await
    }

    pub async fn ask_with_k(&self, question: &str, k: usize) -> Result<Answer> {
        let context = self.search(question, k).await?;
        self.answerer.answer(&context, question).await
    }
}

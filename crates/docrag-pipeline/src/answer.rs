use std::sync::Arc;

use docrag_core::traits::Generator;
use docrag_core::types::{Answer, ChatMessage, Context};
use docrag_core::Result;

/// Returned whenever the documents do not support an answer.
pub const REFUSAL: &str = "I don't know based on the provided documents.";

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant for retrieval-augmented generation (RAG).\n\
Answer ONLY using the provided context. If the answer is not found in the context, say: \
'I don't know based on the provided documents.'";

/// Two-message prompt: the grounding instruction, then context and question.
pub fn build_messages(context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!("Context:\n{context}\n\nQuestion: {question}\nAnswer:")),
    ]
}

/// Answers questions strictly from supplied context.
///
/// Blank context short-circuits to [`REFUSAL`] without calling the generator.
/// Citations are always the supplied context's sources, whether or not the
/// model used all of them.
pub struct GroundedAnswerer {
    generator: Arc<dyn Generator>,
}

impl GroundedAnswerer {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub async fn answer(&self, context: &Context, question: &str) -> Result<Answer> {
        if context.is_empty() {
            tracing::info!("no context retrieved, refusing without generation");
            return Ok(Answer { text: REFUSAL.to_string(), sources: context.sources.clone() });
        }

        let output = self.generator.generate(&build_messages(&context.text, question)).await?;
        let trimmed = output.trim();
        let text = if trimmed.is_empty() {
            tracing::warn!("generator returned empty output, substituting refusal");
            REFUSAL.to_string()
        } else {
            trimmed.to_string()
        };
        Ok(Answer { text, sources: context.sources.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::types::Role;

    #[test]
    fn prompt_embeds_context_and_question() {
        let messages = build_messages("The sky is blue.", "What colour is the sky?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Answer ONLY using the provided context"));
        assert!(messages[0].content.contains(REFUSAL));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "Context:\nThe sky is blue.\n\nQuestion: What colour is the sky?\nAnswer:");
    }
}

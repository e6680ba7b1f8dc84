//! Retrieval-augmented answering chain
//!
//! Retrieves context for the question, then asks the generative backend to answer from that
//! context and the prior conversation.

use crate::retriever::DocumentRetriever;
use kbchat_core::{
    ChatTurn, ErrorContext, GenerativeBackend, KbChatError, KbChatResult, PromptMessage,
    ScoredChunk,
};
use std::sync::Arc;
use tracing::debug;

const QA_SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the user's \
question. If you don't know the answer, just say that you don't know, don't try to make up \
an answer.";

/// Question answering over one tenant's knowledge base
pub struct RetrievalChain {
    retriever: DocumentRetriever,
    backend: Arc<dyn GenerativeBackend>,
}

impl RetrievalChain {
    pub fn new(retriever: DocumentRetriever, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { retriever, backend }
    }

    /// Answer `question` using retrieved context and `history`.
    ///
    /// Fails with a non-recoverable retrieval error when the index holds nothing relevant.
    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> KbChatResult<String> {
        let chunks = self.retriever.retrieve(question).await?;

        if chunks.is_empty() {
            return Err(KbChatError::Retrieval {
                message: format!("No documents found in {}", self.retriever.index_name()),
                source: None,
                context: ErrorContext::new("chain")
                    .with_operation("answer")
                    .with_metadata("index", self.retriever.index_name()),
            });
        }

        let messages = build_qa_messages(question, history, &chunks);
        debug!(
            index = %self.retriever.index_name(),
            context_chunks = chunks.len(),
            history_turns = history.len(),
            "Asking backend with retrieved context"
        );

        self.backend.complete(&messages).await
    }
}

/// System prompt carrying the context, then the prior turns, then the question
pub fn build_qa_messages(
    question: &str,
    history: &[ChatTurn],
    chunks: &[ScoredChunk],
) -> Vec<PromptMessage> {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(format!(
        "{}\n----------------\n{}",
        QA_SYSTEM_PROMPT, context
    )));
    messages.extend(history.iter().map(PromptMessage::from));
    messages.push(PromptMessage::user(question));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbchat_core::PromptRole;
    use std::collections::HashMap;

    #[test]
    fn qa_messages_carry_context_history_and_question() {
        let chunks = vec![ScoredChunk {
            id: "1".to_string(),
            text: "Open 9-5 Monday to Friday".to_string(),
            score: 0.92,
            metadata: HashMap::new(),
        }];
        let history = vec![ChatTurn::user("hello"), ChatTurn::assistant("hi there")];

        let messages = build_qa_messages("What are your hours?", &history, &chunks);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, PromptRole::System);
        assert!(messages[0].content.contains("Open 9-5 Monday to Friday"));
        assert_eq!(messages[1].role, PromptRole::User);
        assert_eq!(messages[2].role, PromptRole::Assistant);
        assert_eq!(messages[3].content, "What are your hours?");
    }
}

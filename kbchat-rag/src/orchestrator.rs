//! Answer orchestration
//!
//! A chat request is answered from the tenant's knowledge base when possible. When that path
//! is unavailable for any reason (no index, nothing retrieved, upstream errors after retries)
//! the question goes to the generative model without grounding. Only a failure of that second
//! path reaches the caller.
//!
//! Each successful answer is written to the chat log. Log failures are swallowed.

use crate::chain::RetrievalChain;
use crate::retriever::DocumentRetriever;
use kbchat_core::{
    log_operation_start, retry_with_policy, validation_error, with_timeout, Answer, AnswerSource,
    ChatLogRecord, ChatLogStore, ChatTurn, Embedder, ErrorContext, GenerativeBackend,
    IndexResolver, KbChatConfig, KbChatError, KbChatResult, PromptMessage, RetryPolicy, Sleeper,
    TokioSleeper,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

const COMPONENT: &str = "orchestrator";

/// The knowledge-base path could not produce an answer
#[derive(Debug, Clone, Error)]
#[error("knowledge base unavailable: {reason}")]
pub struct KbUnavailable {
    pub reason: String,
}

impl From<KbChatError> for KbUnavailable {
    fn from(err: KbChatError) -> Self {
        Self {
            reason: err.to_string(),
        }
    }
}

/// Tunables for one orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub top_k: usize,
    pub retry: RetryPolicy,
    /// Upper bound for a single remote attempt
    pub timeout_ms: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            retry: RetryPolicy::default(),
            timeout_ms: 30_000,
        }
    }
}

impl From<&KbChatConfig> for OrchestratorSettings {
    fn from(config: &KbChatConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            retry: config.retry.policy(),
            timeout_ms: config.retry.timeout_ms,
        }
    }
}

/// Decides between the knowledge-base path and the generative fallback
pub struct AnswerOrchestrator {
    resolver: Arc<dyn IndexResolver>,
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn GenerativeBackend>,
    chat_log: Arc<dyn ChatLogStore>,
    sleeper: Arc<dyn Sleeper>,
    settings: OrchestratorSettings,
}

impl AnswerOrchestrator {
    pub fn new(
        resolver: Arc<dyn IndexResolver>,
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn GenerativeBackend>,
        chat_log: Arc<dyn ChatLogStore>,
    ) -> Self {
        Self {
            resolver,
            embedder,
            backend,
            chat_log,
            sleeper: Arc::new(TokioSleeper),
            settings: OrchestratorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Answer the last turn of `history` for `tenant_id` on behalf of `caller_id`
    pub async fn answer(
        &self,
        history: &[ChatTurn],
        tenant_id: &str,
        caller_id: &str,
    ) -> KbChatResult<Answer> {
        let (question, prior) = split_question(history)?;

        if tenant_id.trim().is_empty() {
            return Err(validation_error!(
                "Tenant identifier is required",
                "companyId",
                COMPONENT
            ));
        }

        log_operation_start!(
            "answer",
            tenant_id = %tenant_id,
            history_turns = history.len()
        );

        let answer = match self.attempt_knowledge_base(tenant_id, question, prior).await {
            Ok(answer) => answer,
            Err(unavailable) => {
                warn!(
                    tenant_id = %tenant_id,
                    reason = %unavailable.reason,
                    "Knowledge base unavailable, falling back to generative model"
                );
                self.attempt_generative(question, history).await?
            }
        };

        info!(
            tenant_id = %tenant_id,
            source = %answer.source,
            "Answer produced"
        );

        self.record(caller_id, tenant_id, question, &answer).await;
        Ok(answer)
    }

    /// Retrieval-augmented answer from the tenant's own index
    pub async fn attempt_knowledge_base(
        &self,
        tenant_id: &str,
        question: &str,
        prior: &[ChatTurn],
    ) -> Result<Answer, KbUnavailable> {
        let index = self.resolver.resolve(tenant_id).await?;

        let chain = RetrievalChain::new(
            DocumentRetriever::new(self.embedder.clone(), index, self.settings.top_k),
            self.backend.clone(),
        );

        let text = retry_with_policy(
            &self.settings.retry,
            self.sleeper.as_ref(),
            "knowledge_base_chain",
            || with_timeout(chain.answer(question, prior), self.settings.timeout_ms, "kb_chain"),
        )
        .await?;

        Ok(Answer {
            text,
            source: AnswerSource::KnowledgeBase,
        })
    }

    /// Ungrounded answer from the generative model. Exhaustion is terminal.
    pub async fn attempt_generative(
        &self,
        question: &str,
        history: &[ChatTurn],
    ) -> KbChatResult<Answer> {
        let messages = vec![PromptMessage::user(build_fallback_prompt(question, history))];

        let result = retry_with_policy(
            &self.settings.retry,
            self.sleeper.as_ref(),
            "generative_fallback",
            || {
                with_timeout(
                    self.backend.complete(&messages),
                    self.settings.timeout_ms,
                    "generative_complete",
                )
            },
        )
        .await;

        match result {
            Ok(text) => Ok(Answer {
                text,
                source: AnswerSource::GenerativeModel,
            }),
            Err(err) => {
                error!(
                    model = %self.backend.model_name(),
                    error = %err,
                    "Generative fallback failed"
                );
                Err(KbChatError::Unavailable {
                    message: format!("Failed to generate response: {}", err),
                    context: ErrorContext::new(COMPONENT)
                        .with_operation("attempt_generative")
                        .with_suggestion("Check the generative model provider status"),
                })
            }
        }
    }

    async fn record(&self, caller_id: &str, tenant_id: &str, question: &str, answer: &Answer) {
        let record = ChatLogRecord::new(caller_id, tenant_id, question, answer);
        let insert = with_timeout(
            self.chat_log.insert(&record),
            self.settings.timeout_ms,
            "chat_log_insert",
        );

        if let Err(err) = insert.await {
            warn!(
                tenant_id = %tenant_id,
                source = %answer.source,
                error = %err,
                "Failed to persist chat log record"
            );
        }
    }
}

/// Split a conversation into its final question and the turns before it
pub fn split_question(history: &[ChatTurn]) -> KbChatResult<(&str, &[ChatTurn])> {
    let Some((last, prior)) = history.split_last() else {
        return Err(validation_error!(
            "Conversation must not be empty",
            "messages",
            COMPONENT
        ));
    };

    if last.content.trim().is_empty() {
        return Err(validation_error!(
            "No message content provided",
            "content",
            COMPONENT
        ));
    }

    Ok((last.content.as_str(), prior))
}

/// Single-message prompt for the ungrounded fallback
pub fn build_fallback_prompt(question: &str, history: &[ChatTurn]) -> String {
    let transcript = history
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "As a helpful assistant, answer the following question based on the conversation history:\n\nHistory:\n{}\n\nQuestion: {}",
        transcript, question
    )
}

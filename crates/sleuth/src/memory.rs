use serde_json::Value;
use std::collections::HashMap;

use crate::completion::CompletionClient;
use crate::models::message::Message;
use crate::prompt_template::load_prompt_file;
use crate::providers::utils::messages_to_openai_spec;
use crate::token_counter::TokenCounter;

pub const MAX_MESSAGES: usize = 24;
pub const KEEP_LATEST: usize = 12;
pub const TOKEN_BUDGET: usize = 10_000;

/// Keeps the conversation within a message count and token budget by folding the
/// older part of it into a summary.
pub struct MemoryManager {
    max_messages: usize,
    keep_latest: usize,
    token_budget: usize,
    counter: TokenCounter,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new(TokenCounter::new())
    }
}

impl MemoryManager {
    pub fn new(counter: TokenCounter) -> Self {
        Self {
            max_messages: MAX_MESSAGES,
            keep_latest: KEEP_LATEST,
            token_budget: TOKEN_BUDGET,
            counter,
        }
    }

    /// Count tokens with the encoding of the chat model in use
    pub fn for_model(model: &str) -> Self {
        Self::new(TokenCounter::for_model(model))
    }

    pub fn with_max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_keep_latest(mut self, keep_latest: usize) -> Self {
        self.keep_latest = keep_latest;
        self
    }

    pub fn with_token_budget(mut self, token_budget: usize) -> Self {
        self.token_budget = token_budget;
        self
    }

    pub fn needs_compaction(&self, conversation: &[Message]) -> bool {
        conversation.len() > self.max_messages
            || self.counter.count_chat_tokens(conversation) > self.token_budget
    }

    /// Replace everything but the latest messages with a system message carrying the
    /// first message's text and a summary of what happened since. Best effort: when
    /// summarizing fails the conversation comes back unchanged.
    ///
    /// A conversation of `keep_latest` messages or fewer is returned as is even when it
    /// is over the token budget, since there is nothing older to summarize.
    pub async fn compact(&self, client: &CompletionClient, conversation: Vec<Message>) -> Vec<Message> {
        if !self.needs_compaction(&conversation) {
            return conversation;
        }
        if conversation.len() <= self.keep_latest {
            tracing::debug!(
                messages = conversation.len(),
                "over token budget but nothing old enough to summarize"
            );
            return conversation;
        }

        let split = conversation.len() - self.keep_latest;
        let (early, latest) = conversation.split_at(split);

        let history = Value::Array(messages_to_openai_spec(early)).to_string();
        let mut context = HashMap::new();
        context.insert("history", history);
        let prompt = match load_prompt_file("summarize.md", &context) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(error = %e, "could not build summary prompt");
                return conversation;
            }
        };

        let summary = match client.complete_text(&prompt).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "conversation summary failed, keeping full history");
                return conversation;
            }
        };

        let first = early[0].text().unwrap_or_default();
        let mut compacted = Vec::with_capacity(latest.len() + 1);
        compacted.push(Message::system().with_text(format!(
            "{}; Here is a summary of past actions taken so far: {}",
            first, summary
        )));
        compacted.extend_from_slice(latest);

        tracing::info!(
            before = conversation.len(),
            after = compacted.len(),
            "compacted conversation"
        );
        compacted
    }
}

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Completion, FinishReason, Provider, ToolChoice, Usage};

/// What the mock saw on one `complete` call
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub tool_choice: ToolChoice,
}

/// A mock provider that returns pre-configured responses for testing.
///
/// `Err` entries are returned as provider failures.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<Message, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(responses: Vec<Result<Message, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        tool_choice: ToolChoice,
    ) -> Result<Completion> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|tool| tool.name.clone()).collect(),
            tool_choice,
        });

        // Return an empty response once the script runs out
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Message::assistant().with_text("")));

        let message = next.map_err(|e| anyhow!(e))?;
        let finish_reason = if message.has_tool_requests() {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        };
        Ok(Completion {
            message,
            finish_reason,
            usage: Usage::default(),
        })
    }
}

#[async_trait]
impl Provider for std::sync::Arc<MockProvider> {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[Tool],
        tool_choice: ToolChoice,
    ) -> Result<Completion> {
        self.as_ref().complete(messages, tools, tool_choice).await
    }
}

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::completion::CompletionClient;
use crate::context::ResearchContext;
use crate::errors::{AgentError, AgentResult};
use crate::memory::MemoryManager;
use crate::models::message::{Message, MessageContent, ToolRequest};
use crate::models::tool::{Tool, ToolCall};
use crate::providers::base::ToolChoice;
use crate::tools::{
    search_observation, ScrapeArgs, SearchArgs, ToolExecutor, ToolKind, UpdateDataArgs,
};

const PLAN_SUFFIX: &str = "Let's think step by step, make a plan first";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    Planning,
    Running,
    Finished(Termination),
}

/// How a run of the loop came to an end
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Termination {
    /// The model answered without requesting a tool
    Completed,
    TurnLimit,
    CompletionFailed(String),
}

#[derive(Debug, Clone, Default)]
pub struct AgentSettings {
    pub plan: bool,
    /// Upper bound on tool-enabled completions per call; unlimited when unset
    pub max_turns: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AgentReply {
    /// Text of the final message of the (compacted) conversation
    pub content: String,
    pub termination: Termination,
    pub messages: Vec<Message>,
}

/// Agent drives the model through request, act and observe rounds until it stops
/// asking for tools
pub struct Agent {
    client: CompletionClient,
    executor: ToolExecutor,
    memory: MemoryManager,
    settings: AgentSettings,
}

impl Agent {
    pub fn new(client: CompletionClient, executor: ToolExecutor) -> Self {
        Self {
            client,
            executor,
            memory: MemoryManager::default(),
            settings: AgentSettings::default(),
        }
    }

    pub fn with_memory(mut self, memory: MemoryManager) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run the loop for one prompt. Never fails: completion failures end the run and
    /// are reported through the reply's termination.
    pub async fn call_agent(
        &self,
        context: &mut ResearchContext,
        system_prompt: &str,
        prompt: &str,
    ) -> AgentReply {
        let tools = self.executor.tools();
        let opening = format!("{} {}", system_prompt, prompt);
        let mut messages = vec![Message::user().with_text(opening.clone())];
        let mut turns = 0;

        let mut state = if self.settings.plan {
            AgentState::Planning
        } else {
            AgentState::Running
        };
        log_message(&messages[0]);

        let termination = loop {
            state = match state {
                AgentState::Planning => {
                    let request = [Message::user().with_text(format!("{} {}", opening, PLAN_SUFFIX))];
                    match self
                        .client
                        .request_completion(&request, ToolChoice::None, &tools)
                        .await
                    {
                        Ok(completion) => {
                            let plan = completion.message.text().unwrap_or_default();
                            let message = Message::assistant().with_text(plan);
                            log_message(&message);
                            messages.push(message);
                            AgentState::Running
                        }
                        Err(failure) => AgentState::Finished(Termination::CompletionFailed(
                            failure.to_string(),
                        )),
                    }
                }
                AgentState::Running => {
                    if self.settings.max_turns.is_some_and(|max| turns >= max) {
                        tracing::warn!(turns, "turn limit reached");
                        AgentState::Finished(Termination::TurnLimit)
                    } else {
                        turns += 1;
                        self.run_turn(context, &mut messages, &tools).await
                    }
                }
                AgentState::Finished(termination) => break termination,
            };
        };

        let messages = self.memory.compact(&self.client, messages).await;
        let content = messages
            .last()
            .and_then(Message::text)
            .unwrap_or_default();

        AgentReply {
            content,
            termination,
            messages,
        }
    }

    /// One model request and the tool calls it asks for
    async fn run_turn(
        &self,
        context: &mut ResearchContext,
        messages: &mut Vec<Message>,
        tools: &[Tool],
    ) -> AgentState {
        let completion = match self
            .client
            .request_completion(messages, ToolChoice::Auto, tools)
            .await
        {
            Ok(completion) => completion,
            Err(failure) => {
                tracing::error!(error = %failure, "Failed to get a valid response");
                return AgentState::Finished(Termination::CompletionFailed(failure.to_string()));
            }
        };

        let response = completion.message;
        log_message(&response);
        messages.push(response.clone());

        let requests = response.tool_requests();
        if requests.is_empty() {
            tracing::debug!(finish_reason = ?completion.finish_reason, "model finished");
            return AgentState::Finished(Termination::Completed);
        }

        // Sequential on purpose: later calls observe the effects of earlier ones
        for request in requests {
            let output = self.dispatch_tool_call(context, request).await;
            let message =
                Message::tool().with_tool_response(request.id.clone(), request.name.clone(), output);
            log_message(&message);
            messages.push(message);
        }
        AgentState::Running
    }

    /// Execute one tool request and turn its outcome into the observation text
    pub async fn dispatch_tool_call(
        &self,
        context: &mut ResearchContext,
        request: &ToolRequest,
    ) -> String {
        match self.run_tool(context, request).await {
            Ok(output) => output,
            Err(AgentError::InvalidParameters(reason)) => format!(
                "Invalid parameters: {}. Please call {} again with valid JSON arguments.",
                reason, request.name
            ),
            Err(e) => e.to_string(),
        }
    }

    async fn run_tool(
        &self,
        context: &mut ResearchContext,
        request: &ToolRequest,
    ) -> AgentResult<String> {
        let kind = self.executor.kind_of(&request.name);
        tracing::info!(tool = %request.name, id = %request.id, "dispatching tool call");

        match kind {
            ToolKind::Unknown(name) => Ok(format!("Unknown function: {}", name)),
            ToolKind::Scrape => {
                let args: ScrapeArgs = parse_arguments(request)?;
                self.executor
                    .fetch_page(context, &args.url)
                    .await
                    .map_err(|e| {
                        tracing::warn!(url = %args.url, error = %e, "scrape failed");
                        AgentError::ExecutionError(e.to_string())
                    })
            }
            ToolKind::Search => {
                let args: SearchArgs = parse_arguments(request)?;
                self.executor
                    .search_and_extract(&self.client, context, &args.query)
                    .await
                    .map(search_observation)
                    .map_err(|e| {
                        tracing::warn!(query = %args.query, error = %e, "search failed");
                        AgentError::ExecutionError(e.to_string())
                    })
            }
            ToolKind::UpdateData => {
                let args: UpdateDataArgs = parse_arguments(request)?;
                Ok(self.executor.apply_updates(context, &args.datas_update))
            }
        }
    }
}

fn parse_arguments<T: DeserializeOwned>(request: &ToolRequest) -> AgentResult<T> {
    let ToolCall { arguments, .. } = request.tool_call()?;
    serde_json::from_value(arguments).map_err(|e| {
        AgentError::InvalidParameters(format!(
            "Could not interpret tool use parameters for id {}: {}",
            request.id, e
        ))
    })
}

fn log_message(message: &Message) {
    for content in &message.content {
        match content {
            MessageContent::Text(text) => {
                tracing::info!(role = message.role.as_str(), "{}", text.text)
            }
            MessageContent::ToolRequest(request) => tracing::info!(
                role = message.role.as_str(),
                tool = %request.name,
                id = %request.id,
                "{}",
                request.arguments
            ),
            MessageContent::ToolResponse(response) => tracing::debug!(
                role = message.role.as_str(),
                tool = %response.name,
                id = %response.id,
                "{}",
                response.output
            ),
        }
    }
}

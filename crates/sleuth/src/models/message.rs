use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;
use super::tool::ToolCall;
use crate::errors::{AgentError, AgentResult};

static FUNCTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("function name pattern is valid"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// A tool invocation as requested by the model.
///
/// The arguments are kept exactly as the model sent them so the request can be
/// echoed back verbatim; they are only parsed when the call is dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolRequest {
    /// Validate the function name and parse the JSON arguments
    pub fn tool_call(&self) -> AgentResult<ToolCall> {
        if !FUNCTION_NAME.is_match(&self.name) {
            return Err(AgentError::ToolNotFound(format!(
                "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                self.name
            )));
        }
        let arguments = if self.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str::<Value>(&self.arguments).map_err(|e| {
                AgentError::InvalidParameters(format!(
                    "Could not interpret tool use parameters for id {}: {}",
                    self.id, e
                ))
            })?
        };
        Ok(ToolCall::new(&self.name, arguments))
    }
}

/// The textual observation produced by running a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    ToolRequest(ToolRequest),
    ToolResponse(ToolResponse),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn tool_request<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        MessageContent::ToolRequest(ToolRequest {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        })
    }

    pub fn tool_response<I, N, O>(id: I, name: N, output: O) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        O: Into<String>,
    {
        MessageContent::ToolResponse(ToolResponse {
            id: id.into(),
            name: name.into(),
            output: output.into(),
        })
    }

    pub fn as_tool_request(&self) -> Option<&ToolRequest> {
        if let MessageContent::ToolRequest(ref tool_request) = self {
            Some(tool_request)
        } else {
            None
        }
    }

    pub fn as_tool_response(&self) -> Option<&ToolResponse> {
        if let MessageContent::ToolResponse(ref tool_response) = self {
            Some(tool_response)
        } else {
            None
        }
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message to or from an LLM
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            created: Utc::now().timestamp(),
            content: Vec::new(),
        }
    }

    /// Create a new system message with the current timestamp
    pub fn system() -> Self {
        Self::new(Role::System)
    }

    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create a new tool message with the current timestamp
    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    /// Add text content to the message
    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add a tool request built from an already parsed call
    pub fn with_tool_request<S: Into<String>>(self, id: S, tool_call: ToolCall) -> Self {
        let arguments = tool_call.arguments.to_string();
        self.with_content(MessageContent::tool_request(id, tool_call.name, arguments))
    }

    /// Add a tool request exactly as the model produced it
    pub fn with_raw_tool_request<I, N, A>(self, id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        self.with_content(MessageContent::tool_request(id, name, arguments))
    }

    /// Add a tool response to the message
    pub fn with_tool_response<I, N, O>(self, id: I, name: N, output: O) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        O: Into<String>,
    {
        self.with_content(MessageContent::tool_response(id, name, output))
    }

    /// All tool requests carried by this message, in the order the model sent them
    pub fn tool_requests(&self) -> Vec<&ToolRequest> {
        self.content
            .iter()
            .filter_map(|content| content.as_tool_request())
            .collect()
    }

    pub fn has_tool_requests(&self) -> bool {
        self.content
            .iter()
            .any(|content| content.as_tool_request().is_some())
    }

    /// The textual content of the message: text parts and tool outputs joined by newlines
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(|content| match content {
                MessageContent::Text(text) => Some(text.text.as_str()),
                MessageContent::ToolResponse(response) => Some(response.output.as_str()),
                MessageContent::ToolRequest(_) => None,
            })
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_request_parses_arguments() {
        let message = Message::assistant()
            .with_tool_request("call_1", ToolCall::new("scrape", json!({"url": "http://x"})));
        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);

        let call = requests[0].tool_call().unwrap();
        assert_eq!(call.name, "scrape");
        assert_eq!(call.arguments, json!({"url": "http://x"}));
    }

    #[test]
    fn test_tool_request_invalid_json() {
        let message = Message::assistant().with_raw_tool_request("1", "update_data", "invalid json {");
        match message.tool_requests()[0].tool_call() {
            Err(AgentError::InvalidParameters(msg)) => {
                assert!(msg.starts_with("Could not interpret tool use parameters"));
            }
            other => panic!("Expected InvalidParameters error, got {:?}", other),
        }
    }

    #[test]
    fn test_tool_request_invalid_function_name() {
        let request = ToolRequest {
            id: "1".to_string(),
            name: "invalid fn".to_string(),
            arguments: "{}".to_string(),
        };
        match request.tool_call() {
            Err(AgentError::ToolNotFound(msg)) => {
                assert!(msg.starts_with("The provided function name"));
            }
            other => panic!("Expected ToolNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_arguments_parse_as_empty_object() {
        let request = ToolRequest {
            id: "1".to_string(),
            name: "scrape".to_string(),
            arguments: "".to_string(),
        };
        assert_eq!(request.tool_call().unwrap().arguments, json!({}));
    }

    #[test]
    fn test_text_joins_text_and_tool_output() {
        let message = Message::assistant().with_text("first").with_text("second");
        assert_eq!(message.text(), Some("first\nsecond".to_string()));

        let tool = Message::tool().with_tool_response("1", "scrape", "page body");
        assert_eq!(tool.text(), Some("page body".to_string()));

        let request_only = Message::assistant().with_raw_tool_request("1", "scrape", "{}");
        assert_eq!(request_only.text(), None);
        assert!(request_only.has_tool_requests());
    }
}

use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Map, Value};

use super::base::FinishReason;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::Tool;

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("sanitize pattern is valid"));

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        // Tool messages are emitted one per response, each carrying its call id
        if message.role == Role::Tool {
            for content in &message.content {
                if let Some(response) = content.as_tool_response() {
                    messages_spec.push(json!({
                        "role": "tool",
                        "tool_call_id": response.id,
                        "name": sanitize_function_name(&response.name),
                        "content": response.output,
                    }));
                }
            }
            continue;
        }

        let mut converted = Map::new();
        converted.insert("role".to_string(), json!(message.role));

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        texts.push(text.text.as_str());
                    }
                }
                MessageContent::ToolRequest(request) => {
                    tool_calls.push(json!({
                        "id": request.id,
                        "type": "function",
                        "function": {
                            "name": sanitize_function_name(&request.name),
                            "arguments": request.arguments,
                        }
                    }));
                }
                // A tool response outside a tool message has no wire representation
                MessageContent::ToolResponse(_) => {}
            }
        }

        if texts.is_empty() {
            if tool_calls.is_empty() {
                converted.insert("content".to_string(), json!(""));
            } else {
                converted.insert("content".to_string(), Value::Null);
            }
        } else {
            converted.insert("content".to_string(), json!(texts.join("\n")));
        }
        if !tool_calls.is_empty() {
            converted.insert("tool_calls".to_string(), Value::Array(tool_calls));
        }

        messages_spec.push(Value::Object(converted));
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to internal Message format, along with the finish reason
pub fn openai_response_to_message(response: &Value) -> Result<(Message, FinishReason)> {
    let choice = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .ok_or_else(|| anyhow!("No choices in response: {}", response))?;
    let reply = &choice["message"];

    let mut message = Message::assistant();

    if let Some(text) = reply.get("content").and_then(|text| text.as_str()) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = reply.get("tool_calls").and_then(|calls| calls.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default();
            let function_name = tool_call["function"]["name"].as_str().unwrap_or_default();
            let arguments = match &tool_call["function"]["arguments"] {
                Value::String(arguments) => arguments.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            message = message.with_raw_tool_request(id, function_name, arguments);
        }
    }

    let finish_reason = FinishReason::from_openai(choice["finish_reason"].as_str());
    Ok((message, finish_reason))
}

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}

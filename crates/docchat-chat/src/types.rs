//! Chat wire types: client messages, stream parts and provider messages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use docchat_store::ToolInvocation;

/// A message as sent by the chat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_invocations: Option<Vec<ToolInvocation>>,
}

impl ClientMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            tool_invocations: None,
        }
    }
}

/// Why a run stopped, in data-stream spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishReason {
    #[default]
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    Other,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ToolCalls => "tool-calls",
            Self::ContentFilter => "content-filter",
            Self::Error => "error",
            Self::Other => "other",
        }
    }

    /// Map an OpenAI `finish_reason`.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "content_filter" => Self::ContentFilter,
            _ => Self::Other,
        }
    }
}

/// Token usage summed over every step of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Usage {
    pub fn add(&mut self, other: Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// One unit of streamed agent output.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    TextDelta(String),
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        args: Value,
        result: Value,
    },
    Error(String),
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
}

impl StreamPart {
    /// Render as one data-stream line, newline included.
    pub fn to_data_stream_line(&self) -> String {
        match self {
            Self::TextDelta(text) => format!("0:{}\n", Value::from(text.as_str())),
            Self::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => format!(
                "9:{}\n",
                json!({"toolCallId": tool_call_id, "toolName": tool_name, "args": args})
            ),
            Self::ToolResult {
                tool_call_id,
                tool_name,
                args,
                result,
            } => format!(
                "a:{}\n",
                json!({
                    "toolCallId": tool_call_id,
                    "toolName": tool_name,
                    "args": args,
                    "result": result,
                })
            ),
            Self::Error(message) => format!("3:{}\n", Value::from(message.as_str())),
            Self::Finish {
                finish_reason,
                usage,
            } => format!(
                "d:{}\n",
                json!({"finishReason": finish_reason.as_str(), "usage": usage})
            ),
        }
    }
}

/// Build the provider message list: system prompt first, then the client
/// history. Assistant turns with tool invocations become an assistant
/// `tool_calls` message, one `tool` message per answered call, then the
/// assistant's text if any.
pub fn to_provider_messages(system_prompt: &str, history: &[ClientMessage]) -> Vec<Value> {
    let mut messages = vec![json!({"role": "system", "content": system_prompt})];

    for message in history {
        match message.role.as_str() {
            "user" | "system" => {
                messages.push(json!({"role": message.role, "content": message.content}));
            }
            "assistant" => {
                // Calls without a result cannot be replayed: the provider
                // requires a tool message for every call id.
                let answered: Vec<&ToolInvocation> = message
                    .tool_invocations
                    .iter()
                    .flatten()
                    .filter(|inv| inv.result.is_some())
                    .collect();

                if !answered.is_empty() {
                    let calls: Vec<ToolCallRequest> = answered
                        .iter()
                        .map(|inv| ToolCallRequest {
                            id: inv.tool_call_id.clone(),
                            name: inv.tool_name.clone(),
                            args: inv.args.clone(),
                        })
                        .collect();
                    messages.push(assistant_tool_calls_message("", &calls));
                    for inv in &answered {
                        let result = inv.result.clone().unwrap_or(Value::Null);
                        messages.push(tool_result_message(&inv.tool_call_id, &result));
                    }
                }

                if !message.content.is_empty() {
                    messages.push(json!({"role": "assistant", "content": message.content}));
                }
            }
            other => tracing::debug!("Skipping message with role {}", other),
        }
    }

    messages
}

/// Assistant message announcing tool calls. Arguments are sent as JSON text.
pub fn assistant_tool_calls_message(text: &str, calls: &[ToolCallRequest]) -> Value {
    let tool_calls: Vec<Value> = calls
        .iter()
        .map(|call| {
            json!({
                "id": call.id,
                "type": "function",
                "function": {"name": call.name, "arguments": call.args.to_string()},
            })
        })
        .collect();

    let content = if text.is_empty() {
        Value::Null
    } else {
        Value::from(text)
    };
    json!({"role": "assistant", "content": content, "tool_calls": tool_calls})
}

pub fn tool_result_message(tool_call_id: &str, result: &Value) -> Value {
    json!({"role": "tool", "tool_call_id": tool_call_id, "content": result.to_string()})
}

//! Streaming client for OpenAI-compatible chat completion APIs.
//!
//! One call to [`LlmClient::stream_step`] is one model turn: text deltas are
//! forwarded as they arrive, tool-call fragments are assembled by index and
//! released when the turn ends.

use std::collections::BTreeMap;

use futures::Stream;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{debug, error};

use crate::types::{FinishReason, ToolCallRequest, Usage};
use docchat_core::ProviderSettings;

/// Event produced while streaming a single model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    TextDelta(String),
    ToolCall(ToolCallRequest),
    Finish {
        reason: FinishReason,
        usage: Option<Usage>,
    },
    Error(String),
}

/// Chat completion client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f64>,
}

impl LlmClient {
    pub fn new(api_base: &str, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key,
            model: model.into(),
            temperature: None,
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        let mut client = Self::new(
            settings.api_base(),
            settings.api_key.clone(),
            settings.chat_model.clone(),
        );
        client.temperature = settings.temperature;
        client
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether an API key is available.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Stream one model turn over `messages`, offering `tools`.
    pub fn stream_step(
        &self,
        messages: Vec<Value>,
        tools: Vec<Value>,
    ) -> impl Stream<Item = StepEvent> + Send + 'static {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();
        let model = self.model.clone();
        let temperature = self.temperature;

        async_stream::stream! {
            let mut body = json!({
                "model": model,
                "messages": messages,
                "stream": true,
                "stream_options": {"include_usage": true},
            });
            if !tools.is_empty() {
                body["tools"] = Value::Array(tools);
            }
            if let Some(t) = temperature {
                body["temperature"] = json!(t);
            }

            debug!("Streaming from {} with model {}", endpoint, model);

            let mut request = client.post(&endpoint).json(&body);
            if let Some(key) = &api_key {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    yield StepEvent::Error(format!("Request failed: {}", e));
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!("Chat API returned {}: {}", status, body);
                yield StepEvent::Error(format!("API error {}: {}", status, body));
                return;
            }

            let mut stream = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut acc = StepAccumulator::default();

            'read: while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        yield StepEvent::Error(format!("Stream read error: {}", e));
                        return;
                    }
                };

                lines.extend(&bytes);

                // Process complete SSE lines
                while let Some(line) = lines.next_line() {
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    if let Some(data) = line.strip_prefix("data:") {
                        let data = data.trim();
                        if data == "[DONE]" {
                            break 'read;
                        }
                        for event in acc.push_data(data) {
                            yield event;
                        }
                    }
                }
            }

            for event in acc.finish() {
                yield event;
            }
        }
    }
}

/// Raw SSE bytes waiting for a newline.
///
/// Lines are decoded only once complete, which keeps multibyte characters
/// split across network chunks intact.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// The next complete line, trimmed, without its terminator.
    fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line[..end]).trim().to_string())
    }
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds SSE `data:` payloads of one turn into [`StepEvent`]s.
#[derive(Debug, Default)]
pub struct StepAccumulator {
    tool_calls: BTreeMap<u64, PartialToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

impl StepAccumulator {
    /// Consume one JSON payload, returning any text to forward right away.
    pub fn push_data(&mut self, data: &str) -> Vec<StepEvent> {
        let parsed: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping unparsable SSE payload: {}", e);
                return Vec::new();
            }
        };

        if let Some(message) = parsed["error"]["message"].as_str() {
            return vec![StepEvent::Error(message.to_string())];
        }

        if let Some(usage) = parsed.get("usage").filter(|u| u.is_object()) {
            self.usage = Some(Usage {
                prompt_tokens: usage["prompt_tokens"].as_u64().unwrap_or(0),
                completion_tokens: usage["completion_tokens"].as_u64().unwrap_or(0),
            });
        }

        let choice = &parsed["choices"][0];
        let mut events = Vec::new();

        if let Some(content) = choice["delta"]["content"].as_str() {
            if !content.is_empty() {
                events.push(StepEvent::TextDelta(content.to_string()));
            }
        }

        if let Some(deltas) = choice["delta"]["tool_calls"].as_array() {
            for delta in deltas {
                let index = delta["index"].as_u64().unwrap_or(0);
                let call = self.tool_calls.entry(index).or_default();
                if let Some(id) = delta["id"].as_str() {
                    call.id.push_str(id);
                }
                if let Some(name) = delta["function"]["name"].as_str() {
                    call.name.push_str(name);
                }
                if let Some(args) = delta["function"]["arguments"].as_str() {
                    call.arguments.push_str(args);
                }
            }
        }

        if let Some(reason) = choice["finish_reason"].as_str() {
            self.finish_reason = Some(FinishReason::from_openai(reason));
        }

        events
    }

    /// End of turn: assembled tool calls in index order, then the finish.
    pub fn finish(self) -> Vec<StepEvent> {
        let has_calls = !self.tool_calls.is_empty();
        let mut events: Vec<StepEvent> = self
            .tool_calls
            .into_values()
            .map(|call| {
                let args = if call.arguments.trim().is_empty() {
                    json!({})
                } else {
                    serde_json::from_str(&call.arguments)
                        .unwrap_or_else(|_| Value::String(call.arguments.clone()))
                };
                StepEvent::ToolCall(ToolCallRequest {
                    id: call.id,
                    name: call.name,
                    args,
                })
            })
            .collect();

        let reason = match self.finish_reason {
            Some(reason) => reason,
            None if has_calls => FinishReason::ToolCalls,
            None => FinishReason::Stop,
        };
        events.push(StepEvent::Finish {
            reason,
            usage: self.usage,
        });
        events
    }
}

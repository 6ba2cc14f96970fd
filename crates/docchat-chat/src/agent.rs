//! Multi-step agent loop: model turn, tool calls, model turn again.

use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::providers::{LlmClient, StepEvent};
use crate::tools::{ToolDefinition, ToolHandler};
use crate::types::{
    assistant_tool_calls_message, to_provider_messages, tool_result_message, ClientMessage,
    FinishReason, StreamPart, Usage,
};
use docchat_store::ToolInvocation;

/// Boxed stream of agent output.
pub type PartStream = Pin<Box<dyn Stream<Item = StreamPart> + Send>>;

/// Run the agent over `history` for at most `max_steps` model turns.
///
/// A turn that requests tools is followed by executing them (in order) and
/// another turn; a turn without tool calls ends the run. The stream always
/// ends with exactly one [`StreamPart::Finish`].
pub fn run_agent(
    client: LlmClient,
    tools: Vec<Arc<dyn ToolHandler>>,
    system_prompt: &str,
    history: &[ClientMessage],
    max_steps: usize,
) -> PartStream {
    let registry: Vec<(ToolDefinition, Arc<dyn ToolHandler>)> =
        tools.into_iter().map(|t| (t.definition(), t)).collect();
    let tool_specs: Vec<Value> = registry.iter().map(|(d, _)| d.to_openai()).collect();
    let mut messages = to_provider_messages(system_prompt, history);

    Box::pin(async_stream::stream! {
        let mut usage = Usage::default();
        let mut finish_reason = FinishReason::Stop;

        for step in 1..=max_steps.max(1) {
            debug!("Agent step {}/{}", step, max_steps);

            let mut text = String::new();
            let mut calls = Vec::new();
            let mut failed = false;

            let mut turn = Box::pin(client.stream_step(messages.clone(), tool_specs.clone()));
            while let Some(event) = turn.next().await {
                match event {
                    StepEvent::TextDelta(delta) => {
                        text.push_str(&delta);
                        yield StreamPart::TextDelta(delta);
                    }
                    StepEvent::ToolCall(call) => calls.push(call),
                    StepEvent::Finish { reason, usage: step_usage } => {
                        finish_reason = reason;
                        if let Some(u) = step_usage {
                            usage.add(u);
                        }
                    }
                    StepEvent::Error(message) => {
                        warn!("Agent step {} failed: {}", step, message);
                        failed = true;
                        yield StreamPart::Error(message);
                    }
                }
            }

            if failed {
                finish_reason = FinishReason::Error;
                break;
            }
            if calls.is_empty() {
                break;
            }

            messages.push(assistant_tool_calls_message(&text, &calls));

            for call in calls {
                yield StreamPart::ToolCall {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    args: call.args.clone(),
                };

                let result = match registry.iter().find(|(d, _)| d.name == call.name) {
                    Some((_, handler)) => {
                        info!("Calling tool {} ({})", call.name, call.id);
                        handler.call(call.args.clone()).await
                    }
                    None => {
                        warn!("Model requested unknown tool {}", call.name);
                        json!({"error": format!("Unknown tool: {}", call.name)})
                    }
                };

                messages.push(tool_result_message(&call.id, &result));
                yield StreamPart::ToolResult {
                    tool_call_id: call.id,
                    tool_name: call.name,
                    args: call.args,
                    result,
                };
            }
        }

        yield StreamPart::Finish { finish_reason, usage };
    })
}

/// Collects what the assistant produced during a run, for persistence.
#[derive(Debug, Clone, Default)]
pub struct AssistantTranscript {
    pub text: String,
    pub tool_invocations: Vec<ToolInvocation>,
}

impl AssistantTranscript {
    pub fn observe(&mut self, part: &StreamPart) {
        match part {
            StreamPart::TextDelta(delta) => self.text.push_str(delta),
            StreamPart::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => self.tool_invocations.push(ToolInvocation {
                tool_call_id: tool_call_id.clone(),
                tool_name: tool_name.clone(),
                args: args.clone(),
                result: None,
            }),
            StreamPart::ToolResult {
                tool_call_id,
                result,
                ..
            } => {
                if let Some(inv) = self
                    .tool_invocations
                    .iter_mut()
                    .find(|inv| &inv.tool_call_id == tool_call_id)
                {
                    inv.result = Some(result.clone());
                }
            }
            StreamPart::Error(_) | StreamPart::Finish { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::State;
    use axum::http::{header, StatusCode};
    use axum::response::Response;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "searchInRAG".into(),
                description: "echo".into(),
                parameters: json!({"type": "object", "properties": {"query": {"type": "string"}}}),
                strict: true,
            }
        }

        async fn call(&self, args: Value) -> Value {
            json!({"echo": args["query"]})
        }
    }

    #[derive(Default)]
    struct MockState {
        calls: AtomicUsize,
        bodies: Mutex<Vec<Value>>,
        /// When set, every turn asks for a tool.
        always_tools: bool,
    }

    fn sse(payloads: &[Value]) -> Response {
        let mut body = String::new();
        for p in payloads {
            body.push_str(&format!("data: {}\n\n", p));
        }
        body.push_str("data: [DONE]\n\n");
        Response::builder()
            .header(header::CONTENT_TYPE, "text/event-stream")
            .body(Body::from(body))
            .unwrap()
    }

    fn tool_turn(id: &str) -> Response {
        sse(&[
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "id": id, "type": "function", "function": {"name": "searchInRAG", "arguments": "{\"query\":"}}]}}]}),
            json!({"choices": [{"delta": {"tool_calls": [{"index": 0, "function": {"arguments": "\"rust\"}"}}]}}]}),
            json!({"choices": [{"delta": {}, "finish_reason": "tool_calls"}]}),
            json!({"choices": [], "usage": {"prompt_tokens": 10, "completion_tokens": 5}}),
        ])
    }

    async fn completions(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
        let n = state.calls.fetch_add(1, Ordering::SeqCst);
        state.bodies.lock().unwrap().push(body);

        if state.always_tools || n == 0 {
            return tool_turn(&format!("call_{}", n + 1));
        }
        sse(&[
            json!({"choices": [{"delta": {"content": "Hello"}}]}),
            json!({"choices": [{"delta": {"content": " world"}}]}),
            json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
            json!({"choices": [], "usage": {"prompt_tokens": 20, "completion_tokens": 3}}),
        ])
    }

    async fn serve(state: Arc<MockState>) -> String {
        let router = Router::new()
            .route("/chat/completions", post(completions))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn collect(stream: PartStream) -> Vec<StreamPart> {
        stream.collect::<Vec<_>>().await
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let state = Arc::new(MockState::default());
        let base = serve(state.clone()).await;
        let client = LlmClient::new(&base, Some("k".into()), "test/model");

        let parts = collect(run_agent(
            client,
            vec![Arc::new(EchoTool) as Arc<dyn ToolHandler>],
            "SYS",
            &[ClientMessage::user("Tell me about rust")],
            5,
        ))
        .await;

        assert_eq!(
            parts,
            vec![
                StreamPart::ToolCall {
                    tool_call_id: "call_1".into(),
                    tool_name: "searchInRAG".into(),
                    args: json!({"query": "rust"}),
                },
                StreamPart::ToolResult {
                    tool_call_id: "call_1".into(),
                    tool_name: "searchInRAG".into(),
                    args: json!({"query": "rust"}),
                    result: json!({"echo": "rust"}),
                },
                StreamPart::TextDelta("Hello".into()),
                StreamPart::TextDelta(" world".into()),
                StreamPart::Finish {
                    finish_reason: FinishReason::Stop,
                    usage: Usage {
                        prompt_tokens: 30,
                        completion_tokens: 8
                    },
                },
            ]
        );

        let bodies = state.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["stream"], true);
        assert_eq!(bodies[0]["tools"][0]["function"]["name"], "searchInRAG");
        let second = bodies[1]["messages"].as_array().unwrap();
        let last = second.last().unwrap();
        assert_eq!(last["role"], "tool");
        assert_eq!(last["tool_call_id"], "call_1");
        assert_eq!(second[second.len() - 2]["tool_calls"][0]["id"], "call_1");
    }

    #[tokio::test]
    async fn test_step_limit_is_enforced() {
        let state = Arc::new(MockState {
            always_tools: true,
            ..Default::default()
        });
        let base = serve(state.clone()).await;
        let client = LlmClient::new(&base, None, "test/model");

        let parts = collect(run_agent(
            client,
            vec![Arc::new(EchoTool) as Arc<dyn ToolHandler>],
            "SYS",
            &[ClientMessage::user("loop")],
            2,
        ))
        .await;

        assert_eq!(state.calls.load(Ordering::SeqCst), 2);
        let results = parts
            .iter()
            .filter(|p| matches!(p, StreamPart::ToolResult { .. }))
            .count();
        assert_eq!(results, 2);
        assert!(matches!(
            parts.last(),
            Some(StreamPart::Finish {
                finish_reason: FinishReason::ToolCalls,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_provider_error_ends_run() {
        let router = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let client = LlmClient::new(&format!("http://{}", addr), None, "m");

        let parts = collect(run_agent(client, Vec::new(), "SYS", &[ClientMessage::user("hi")], 5)).await;
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], StreamPart::Error(msg) if msg.contains("401")));
        assert!(matches!(
            parts[1],
            StreamPart::Finish {
                finish_reason: FinishReason::Error,
                ..
            }
        ));
    }

    #[test]
    fn test_transcript_combines_calls_and_results() {
        let mut transcript = AssistantTranscript::default();
        let parts = vec![
            StreamPart::ToolCall {
                tool_call_id: "c1".into(),
                tool_name: "searchInRAG".into(),
                args: json!({"query": "q"}),
            },
            StreamPart::ToolCall {
                tool_call_id: "c2".into(),
                tool_name: "searchInRAG".into(),
                args: json!({"query": "r"}),
            },
            StreamPart::ToolResult {
                tool_call_id: "c1".into(),
                tool_name: "searchInRAG".into(),
                args: json!({"query": "q"}),
                result: json!({"results": []}),
            },
            StreamPart::TextDelta("Answer".into()),
            StreamPart::TextDelta(".".into()),
        ];
        for part in &parts {
            transcript.observe(part);
        }

        assert_eq!(transcript.text, "Answer.");
        assert_eq!(transcript.tool_invocations.len(), 2);
        assert_eq!(transcript.tool_invocations[0].result, Some(json!({"results": []})));
        assert_eq!(transcript.tool_invocations[1].result, None);
    }
}

//! Chat routes: message history and the streamed agent run.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::error_response;
use crate::state::AppState;
use docchat_chat::{
    run_agent, AssistantTranscript, ClientMessage, StreamPart, ToolHandler, SYSTEM_PROMPT,
};
use docchat_retrieve::SearchInRagTool;
use docchat_store::{ChatScope, NewMessage, SqliteStore};

pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";

/// Parts buffered between the agent task and a slow client.
const PART_BUFFER: usize = 64;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", get(history).post(chat))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<ClientMessage>,
    chat_id: Option<String>,
}

/// GET /api/chat?chatId=: stored messages, oldest first.
async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let chat_id = state.resolve_chat_id(query.chat_id.as_deref());

    match state.store.list_messages(&chat_id) {
        Ok(messages) => {
            let formatted: Vec<serde_json::Value> = messages
                .into_iter()
                .map(|m| {
                    let mut value = serde_json::json!({
                        "id": m.id,
                        "role": m.role,
                        "content": m.content,
                    });
                    if let Some(invocations) = m.tool_invocations {
                        value["toolInvocations"] = serde_json::json!(invocations);
                    }
                    value
                })
                .collect();
            Json(formatted).into_response()
        }
        Err(e) => {
            error!("Failed to load history for {}: {}", chat_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!([]))).into_response()
        }
    }
}

/// POST /api/chat: persist the user turn, then stream the agent run.
async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    let Some(last) = req.messages.last() else {
        return error_response(StatusCode::BAD_REQUEST, "messages must not be empty");
    };
    if last.role != "user" {
        return error_response(StatusCode::BAD_REQUEST, "the last message must come from the user");
    }
    if !state.llm.is_configured() {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "No API key configured for the chat model",
        );
    }

    let chat_id = state.resolve_chat_id(req.chat_id.as_deref());
    let persisted = state
        .ensure_chat(&chat_id)
        .and_then(|_| state.store.append_message(&NewMessage::user(&chat_id, &last.content)));
    if let Err(e) = persisted {
        error!("Failed to store user message for {}: {}", chat_id, e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }

    info!(
        "Chat {}: running agent over {} messages",
        chat_id,
        req.messages.len()
    );

    let tool = SearchInRagTool::new(
        state.store.clone(),
        state.embedder.clone(),
        ChatScope::Chat(chat_id.clone()),
        state.config.search_top_k,
    );
    let tools: Vec<Arc<dyn ToolHandler>> = vec![Arc::new(tool)];
    let mut parts = run_agent(
        state.llm.clone(),
        tools,
        SYSTEM_PROMPT,
        &req.messages,
        state.config.max_agent_steps,
    );

    // The run outlives the response body: a client that disconnects early
    // still gets its reply stored.
    let (tx, mut rx) = mpsc::channel::<StreamPart>(PART_BUFFER);
    let store = state.store.clone();
    tokio::spawn(async move {
        let mut transcript = AssistantTranscript::default();
        let mut client_gone = false;
        while let Some(part) = parts.next().await {
            transcript.observe(&part);
            if matches!(part, StreamPart::Finish { .. }) {
                persist_assistant(&store, &chat_id, std::mem::take(&mut transcript));
            }
            if !client_gone && tx.send(part).await.is_err() {
                debug!("Client left chat {}; finishing the run without it", chat_id);
                client_gone = true;
            }
        }
    });

    let lines = async_stream::stream! {
        while let Some(part) = rx.recv().await {
            yield Ok::<_, Infallible>(part.to_data_stream_line());
        }
    };

    (
        StatusCode::OK,
        [
            ("content-type", "text/plain; charset=utf-8"),
            (DATA_STREAM_HEADER, "v1"),
            ("cache-control", "no-cache, no-transform"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

fn persist_assistant(store: &SqliteStore, chat_id: &str, transcript: AssistantTranscript) {
    let message = NewMessage::assistant(chat_id, transcript.text, transcript.tool_invocations);
    match store.append_message(&message) {
        Ok(stored) => info!("Stored assistant reply {} in {}", stored.id, chat_id),
        Err(e) => error!("Failed to store assistant reply in {}: {}", chat_id, e),
    }
}

//! Chat CRUD: list, create, delete (cascading to messages and documents).

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{error, info};

use super::error_response;
use crate::state::{AppState, NEW_CHAT_TITLE};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chats", get(list_chats).post(create_chat).delete(delete_chat))
}

#[derive(Debug, Default, Deserialize)]
struct CreateChatRequest {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    id: Option<String>,
}

/// GET /api/chats: newest first.
async fn list_chats(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list_chats() {
        Ok(chats) => Json(chats).into_response(),
        Err(e) => {
            error!("Failed to list chats: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!([]))).into_response()
        }
    }
}

/// POST /api/chats: body `{title?}`, which may be absent entirely. A body
/// that is present but not valid JSON is rejected.
async fn create_chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: CreateChatRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateChatRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                let message = format!("Invalid request body: {}", e);
                return error_response(StatusCode::BAD_REQUEST, message);
            }
        }
    };
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(NEW_CHAT_TITLE);

    match state.store.create_chat(title) {
        Ok(chat) => {
            info!("Created chat {} ({})", chat.id, chat.title);
            Json(chat).into_response()
        }
        Err(e) => {
            error!("Failed to create chat: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create chat")
        }
    }
}

/// DELETE /api/chats?id=
async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    let Some(id) = query.id.filter(|id| !id.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid ID");
    };

    match state.store.delete_chat(&id) {
        Ok(true) => {
            info!("Deleted chat {}", id);
            Json(serde_json::json!({ "success": true })).into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, format!("Chat {} not found", id)),
        Err(e) => {
            error!("Failed to delete chat {}: {}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete chat")
        }
    }
}

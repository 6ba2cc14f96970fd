//! Service health and counters.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::error;

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status))
}

/// GET /api/status
async fn get_status(State(state): State<Arc<AppState>>) -> Response {
    let stats = match state.store.get_stats() {
        Ok(stats) => stats,
        Err(e) => {
            error!("Failed to read store stats: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "chats": stats.chats,
        "messages": stats.messages,
        "chunks": stats.chunks,
        "embeddingDimension": stats.embedding_dimension,
        "embeddingModel": state.embedder.model(),
        "chatModel": state.llm.model(),
        "llmConfigured": state.llm.is_configured(),
        "defaultChatId": state.config.default_chat_id,
        "dbPath": stats.db_path,
    }))
    .into_response()
}

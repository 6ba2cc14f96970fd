//! Direct retrieval endpoint, returning the same payload the agent tool sees.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use crate::state::AppState;
use docchat_retrieve::search_in_rag;
use docchat_store::ChatScope;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/search", post(search))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest {
    #[serde(default)]
    query: String,
    chat_id: Option<String>,
    top_k: Option<usize>,
}

/// POST /api/search: always 200; failures are inside the payload.
async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Json<serde_json::Value> {
    let scope = ChatScope::Chat(state.resolve_chat_id(req.chat_id.as_deref()));
    let top_k = req.top_k.unwrap_or(state.config.search_top_k);

    let outcome = search_in_rag(
        &state.store,
        state.embedder.as_ref(),
        &req.query,
        &scope,
        top_k,
    )
    .await;
    Json(outcome.to_value())
}

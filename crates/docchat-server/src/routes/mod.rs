//! HTTP route handlers, all mounted under `/api`.

pub mod chat;
pub mod chats;
pub mod search;
pub mod status;
pub mod upload;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes(state: &AppState) -> Router<Arc<AppState>> {
    Router::new()
        .merge(upload::routes(state.config.max_upload_bytes))
        .merge(search::routes())
        .merge(chat::routes())
        .merge(chats::routes())
        .merge(status::routes())
}

/// `{error}` JSON body with the given status.
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

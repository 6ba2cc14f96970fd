//! Document upload: multipart file → text → chunks → embeddings.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{error, info, warn};

use super::error_response;
use crate::state::AppState;
use docchat_core::Error;
use docchat_ingest::{DocumentFormat, Ingester, SmartChunker};

/// Allowance for multipart framing on top of the file size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const FALLBACK_FILE_NAME: &str = "untitled_document";

pub fn routes(max_upload_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD))
}

struct UploadedFile {
    file_name: String,
    bytes: Vec<u8>,
}

/// POST /api/upload: index one document into a chat.
async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let max_bytes = state.config.max_upload_bytes;
    let mut file: Option<UploadedFile> = None;
    let mut chat_id: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_error(e.status(), &e.body_text(), max_bytes),
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(FALLBACK_FILE_NAME)
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        file = Some(UploadedFile {
                            file_name,
                            bytes: bytes.to_vec(),
                        })
                    }
                    Err(e) => return multipart_error(e.status(), &e.body_text(), max_bytes),
                }
            }
            "chatId" => match field.text().await {
                Ok(text) => chat_id = Some(text),
                Err(e) => return multipart_error(e.status(), &e.body_text(), max_bytes),
            },
            _ => {}
        }
    }

    let Some(file) = file else {
        return error_response(StatusCode::BAD_REQUEST, "No file found in the request");
    };

    info!(
        "Received {} ({:.1} KB)",
        file.file_name,
        file.bytes.len() as f64 / 1024.0
    );

    if file.bytes.len() > max_bytes {
        return too_large(max_bytes);
    }
    if let Err(e) = DocumentFormat::from_file_name(&file.file_name) {
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let chat_id = state.resolve_chat_id(chat_id.as_deref());
    if let Err(e) = state.ensure_chat(&chat_id) {
        error!("Failed to prepare chat {}: {}", chat_id, e);
        return processing_failed(&e);
    }

    let tmp_path = state.config.data_paths.tmp_uploads.join(format!(
        "{}-{}",
        uuid::Uuid::new_v4(),
        sanitize_filename(&file.file_name)
    ));
    if let Err(e) = std::fs::write(&tmp_path, &file.bytes) {
        error!("Failed to write upload to {}: {}", tmp_path.display(), e);
        return processing_failed(&Error::Io(e));
    }

    let ingester = Ingester::new(
        &state.store,
        state.embedder.as_ref(),
        SmartChunker::new(state.config.max_chunk_len),
    );
    let result = ingester
        .ingest_file(&tmp_path, &file.file_name, &chat_id)
        .await;

    if let Err(e) = std::fs::remove_file(&tmp_path) {
        warn!("Could not remove {}: {}", tmp_path.display(), e);
    }

    match result {
        Ok(report) => {
            let mut body = serde_json::json!({
                "message": "Document indexed successfully",
                "fileName": report.file_name,
                "chatId": chat_id,
                "chunks": report.chunks_processed,
                "totalChunks": report.total_chunks,
                "textLength": report.text_length,
            });
            if !report.errors.is_empty() {
                body["errors"] = serde_json::json!(report.errors);
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e @ (Error::UnsupportedFormat { .. } | Error::EmptyText)) => {
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => {
            error!("Upload of {} failed: {}", file.file_name, e);
            processing_failed(&e)
        }
    }
}

fn processing_failed(e: &Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": "Failed to process the document",
            "details": e.to_string(),
        })),
    )
        .into_response()
}

fn too_large(max_bytes: usize) -> Response {
    const MB: usize = 1024 * 1024;
    let limit = if max_bytes >= MB && max_bytes % MB == 0 {
        format!("{} MB", max_bytes / MB)
    } else {
        format!("{} bytes", max_bytes)
    };
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("File exceeds the {} limit", limit),
    )
}

fn multipart_error(status: StatusCode, message: &str, max_bytes: usize) -> Response {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large(max_bytes);
    }
    error_response(StatusCode::BAD_REQUEST, format!("Invalid upload: {}", message))
}

fn sanitize_filename(name: &str) -> String {
    // Remove directory components
    let name = name.replace(['/', '\\'], "").replace("..", "");

    std::path::Path::new(&name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string()
}

//! Error types for DocChat.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported format: {extension}. Use {allowed}")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("No text could be extracted from the file. Check that it is not empty or an image-only PDF")]
    EmptyText,

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding API error ({status}): {body}")]
    EmbeddingHttp { status: u16, body: String },

    #[error("Unexpected embedding response: {0}")]
    MalformedEmbedding(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("The query is empty. Infer a topic from the user's question (for example: 'document summary') and try again.")]
    EmptyQuery,

    #[error("No chunk could be indexed ({} errors)", errors.len())]
    NothingIndexed { errors: Vec<String> },

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

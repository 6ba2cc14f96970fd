//! Document ingestion pipeline: file → text → chunks → embeddings → store.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chunking::SmartChunker;
use crate::file;
use docchat_core::{Error, Result};
use docchat_embed::Embedder;
use docchat_store::{ChunkMetadata, NewDocumentChunk, SqliteStore};

/// Outcome of an ingestion run with at least one indexed chunk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub file_name: String,
    pub chunks_processed: usize,
    pub total_chunks: usize,
    /// One `"Chunk {n}: {error}"` entry per failed chunk, 1-based.
    pub errors: Vec<String>,
    /// Length of the extracted text in characters.
    pub text_length: usize,
}

/// Extracts, chunks, embeds and stores documents for one chat.
pub struct Ingester<'a> {
    store: &'a SqliteStore,
    embedder: &'a dyn Embedder,
    chunker: SmartChunker,
}

impl<'a> Ingester<'a> {
    pub fn new(store: &'a SqliteStore, embedder: &'a dyn Embedder, chunker: SmartChunker) -> Self {
        Self {
            store,
            embedder,
            chunker,
        }
    }

    /// Ingest the file at `path`. `file_name` is the client's name for it and
    /// decides the format.
    pub async fn ingest_file(
        &self,
        path: &Path,
        file_name: &str,
        chat_id: &str,
    ) -> Result<IngestReport> {
        let text = file::extract_text(path, file_name)?;
        info!(
            "Extracted {} chars from {}",
            text.chars().count(),
            file_name
        );
        self.ingest_text(&text, file_name, chat_id).await
    }

    /// Chunk and index already-extracted text. Chunks are processed in order;
    /// a failing chunk is recorded and skipped.
    pub async fn ingest_text(
        &self,
        text: &str,
        file_name: &str,
        chat_id: &str,
    ) -> Result<IngestReport> {
        let chunks = self.chunker.chunk(text);
        let total_chunks = chunks.len();
        let uploaded_at = chrono::Utc::now().to_rfc3339();
        info!("Indexing {} ({} chunks) into chat {}", file_name, total_chunks, chat_id);

        let mut chunks_processed = 0;
        let mut errors = Vec::new();

        for chunk in &chunks {
            let metadata = ChunkMetadata {
                file_name: file_name.to_string(),
                chunk_index: chunk.chunk_index,
                total_chunks,
                chunk_length: chunk.char_length,
                uploaded_at: uploaded_at.clone(),
            };

            match self.index_chunk(chat_id, &chunk.text, &metadata).await {
                Ok(id) => {
                    chunks_processed += 1;
                    debug!("Chunk {}/{} stored as {}", chunk.chunk_index + 1, total_chunks, id);
                }
                Err(e) => {
                    warn!("Chunk {} of {} failed: {}", chunk.chunk_index + 1, file_name, e);
                    errors.push(format!("Chunk {}: {}", chunk.chunk_index + 1, e));
                }
            }
        }

        if chunks_processed == 0 {
            return Err(Error::NothingIndexed { errors });
        }

        info!(
            "Indexed {}/{} chunks of {} ({} errors)",
            chunks_processed,
            total_chunks,
            file_name,
            errors.len()
        );

        Ok(IngestReport {
            file_name: file_name.to_string(),
            chunks_processed,
            total_chunks,
            errors,
            text_length: text.chars().count(),
        })
    }

    async fn index_chunk(
        &self,
        chat_id: &str,
        content: &str,
        metadata: &ChunkMetadata,
    ) -> Result<String> {
        let embedding = self.embedder.embed(content).await?;
        self.store.add_chunk(&NewDocumentChunk {
            chat_id,
            content,
            embedding: &embedding,
            metadata,
        })
    }
}

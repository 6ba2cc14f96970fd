//! SQLite store for chats, messages and chunk embeddings.
//!
//! Vector distance is a scalar SQL function registered on the connection,
//! so ranking is a plain `ORDER BY ... LIMIT` executed by SQLite.

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::embedding::{cosine_distance, decode_vector, encode_vector};
use crate::schema::{COSINE_DISTANCE_FN, SCHEMA_SQL};
use crate::types::*;
use docchat_core::{Error, Result};

/// SQLite store with chat history and cosine vector search over chunks.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: usize,
}

impl SqliteStore {
    /// Open or create the SQLite store.
    ///
    /// `db_dir` is the directory (e.g., `data/vectordb/`). The file will be `db_dir/docchat.db`.
    pub fn open(db_dir: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)?;
        let db_path = db_dir.join("docchat.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim,
        };

        let stats = store.get_stats()?;
        info!(
            "SqliteStore initialized: {} chats, {} chunks, dim={}, path={}",
            stats.chats,
            stats.chunks,
            embedding_dim,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Self::register_vector_functions(&conn)?;
        Ok(conn)
    }

    fn register_vector_functions(conn: &Connection) -> Result<()> {
        conn.create_scalar_function(
            COSINE_DISTANCE_FN,
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| -> rusqlite::Result<Option<f64>> {
                let (a, b) = match (ctx.get_raw(0), ctx.get_raw(1)) {
                    (ValueRef::Blob(a), ValueRef::Blob(b)) => (a, b),
                    _ => return Ok(None),
                };
                Ok(match (decode_vector(a), decode_vector(b)) {
                    (Some(a), Some(b)) => cosine_distance(&a, &b),
                    _ => None,
                })
            },
        )
        .map_err(|e| Error::Database(format!("Failed to register {}: {}", COSINE_DISTANCE_FN, e)))
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len != self.embedding_dim {
            return Err(Error::DimensionMismatch {
                expected: self.embedding_dim,
                actual: len,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Chats
    // ---------------------------------------------------------------

    /// Create a chat with a fresh id.
    pub fn create_chat(&self, title: &str) -> Result<Chat> {
        let chat = Chat {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        let conn = self.conn.lock();
        conn.prepare_cached("INSERT INTO chats (id, title, created_at) VALUES (?1, ?2, ?3)")
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![chat.id, chat.title, chat.created_at])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(chat)
    }

    /// Return the chat with `id`, creating it with `title` if absent.
    pub fn ensure_chat(&self, id: &str, title: &str) -> Result<Chat> {
        {
            let conn = self.conn.lock();
            let inserted = conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO chats (id, title, created_at) VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| Error::Database(e.to_string()))?
                .execute(params![id, title, Utc::now()])
                .map_err(|e| Error::Database(e.to_string()))?;
            if inserted > 0 {
                debug!("Created chat {}", id);
            }
        }
        self.get_chat(id)?
            .ok_or_else(|| Error::Internal(format!("Chat {} vanished after insert", id)))
    }

    pub fn get_chat(&self, id: &str) -> Result<Option<Chat>> {
        let conn = self.conn.lock();
        let chat = conn
            .prepare_cached("SELECT id, title, created_at FROM chats WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![id], Self::row_to_chat)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(chat)
    }

    /// All chats, newest first.
    pub fn list_chats(&self) -> Result<Vec<Chat>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, title, created_at FROM chats ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_chat)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Delete a chat together with its messages and document chunks.
    pub fn delete_chat(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM chats WHERE id = ?1", params![id])
            .map_err(|e| Error::Database(e.to_string()))?;
        if count > 0 {
            info!("Deleted chat {}", id);
        }
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------

    /// Append a message to an existing chat.
    pub fn append_message(&self, message: &NewMessage) -> Result<Message> {
        let stored = Message {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: message.chat_id.clone(),
            role: message.role,
            content: message.content.clone(),
            tool_invocations: message.tool_invocations.clone(),
            reasoning: message.reasoning.clone(),
            created_at: Utc::now(),
        };
        let tool_calls_json = stored
            .tool_invocations
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO messages (id, chat_id, role, content, tool_calls_json, reasoning, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            stored.id,
            stored.chat_id,
            stored.role.as_str(),
            stored.content,
            tool_calls_json,
            stored.reasoning,
            stored.created_at,
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(stored)
    }

    /// Messages of a chat in the order they were appended.
    pub fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, chat_id, role, content, tool_calls_json, reasoning, created_at \
                 FROM messages WHERE chat_id = ?1 ORDER BY created_at ASC, rowid ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![chat_id], Self::row_to_message)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Document chunks
    // ---------------------------------------------------------------

    /// Insert one chunk row. Returns the new chunk ID.
    pub fn add_chunk(&self, chunk: &NewDocumentChunk<'_>) -> Result<String> {
        self.check_dimension(chunk.embedding.len())?;

        let id = uuid::Uuid::new_v4().to_string();
        let meta_json = serde_json::to_string(chunk.metadata)?;
        let blob = encode_vector(chunk.embedding);

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO documents (id, chat_id, content, embedding, metadata_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            id,
            chunk.chat_id,
            chunk.content,
            blob,
            meta_json,
            Utc::now()
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    /// Nearest chunks to `query` by cosine distance, ascending.
    pub fn search_similar(
        &self,
        query: &[f32],
        scope: &ChatScope,
        limit: usize,
    ) -> Result<Vec<SimilarChunk>> {
        self.check_dimension(query.len())?;

        let sql = format!(
            "SELECT id, content, metadata_json, distance FROM ( \
                 SELECT id, content, metadata_json, {}(embedding, ?1) AS distance \
                 FROM documents \
                 WHERE embedding IS NOT NULL AND (?2 IS NULL OR chat_id = ?2) \
             ) \
             WHERE distance IS NOT NULL \
             ORDER BY distance ASC \
             LIMIT ?3",
            COSINE_DISTANCE_FN
        );

        // A negative LIMIT means "no limit" to SQLite.
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(&sql)
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(
                params![encode_vector(query), scope.chat_id(), limit],
                |row| {
                    let meta_json: String = row.get(2)?;
                    Ok(SimilarChunk {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        metadata: serde_json::from_str(&meta_json)
                            .unwrap_or(serde_json::Value::Null),
                        distance: row.get(3)?,
                    })
                },
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let hits = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::Database(e.to_string()))?;

        debug!("Vector search ({:?}) returned {} chunks", scope, hits.len());
        Ok(hits)
    }

    /// Count stored chunks within a scope.
    pub fn count_chunks(&self, scope: &ChatScope) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE (?1 IS NULL OR chat_id = ?1)",
            params![scope.chat_id()],
            |row| row.get(0),
        )
        .map_err(|e| Error::Database(e.to_string()))
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<i64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::Database(e.to_string()))
        };
        Ok(StoreStats {
            chats: count("chats")?,
            messages: count("messages")?,
            chunks: count("documents")?,
            embedding_dimension: self.embedding_dim,
            db_path: self.db_path.to_string_lossy().to_string(),
        })
    }

    // ---------------------------------------------------------------
    // Row mapping
    // ---------------------------------------------------------------

    fn row_to_chat(row: &Row<'_>) -> rusqlite::Result<Chat> {
        Ok(Chat {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
        let role: String = row.get(2)?;
        let tool_calls_json: Option<String> = row.get(4)?;
        Ok(Message {
            id: row.get(0)?,
            chat_id: row.get(1)?,
            role: ChatRole::parse(&role).unwrap_or(ChatRole::Assistant),
            content: row.get(3)?,
            tool_invocations: tool_calls_json
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            reasoning: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

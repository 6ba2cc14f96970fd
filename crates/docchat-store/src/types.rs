//! Data types for chats, messages, document chunks and search hits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation. Owns its messages and uploaded document chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool call made by the model together with its result.
///
/// Older payloads named the fields `input` and `output`; both spellings are
/// accepted and the canonical `args`/`result` are always written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default, alias = "input")]
    pub args: serde_json::Value,
    #[serde(default, alias = "output")]
    pub result: Option<serde_json::Value>,
}

/// A persisted chat message. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_invocations: Option<Vec<ToolInvocation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to append a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub chat_id: String,
    pub role: ChatRole,
    pub content: String,
    pub tool_invocations: Option<Vec<ToolInvocation>>,
    pub reasoning: Option<String>,
}

impl NewMessage {
    pub fn user(chat_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            role: ChatRole::User,
            content: content.into(),
            tool_invocations: None,
            reasoning: None,
        }
    }

    pub fn assistant(
        chat_id: impl Into<String>,
        content: impl Into<String>,
        tool_invocations: Vec<ToolInvocation>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            role: ChatRole::Assistant,
            content: content.into(),
            tool_invocations: if tool_invocations.is_empty() {
                None
            } else {
                Some(tool_invocations)
            },
            reasoning: None,
        }
    }
}

/// Metadata written alongside every document chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub file_name: String,
    /// Position of the chunk in the split of its source document.
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Length of the chunk text in characters.
    pub chunk_length: usize,
    /// RFC 3339 upload timestamp.
    pub uploaded_at: String,
}

/// A chunk ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewDocumentChunk<'a> {
    pub chat_id: &'a str,
    pub content: &'a str,
    pub embedding: &'a [f32],
    pub metadata: &'a ChunkMetadata,
}

/// Which chat's chunks a vector search may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatScope {
    /// Only chunks uploaded to this chat.
    Chat(String),
    /// Every stored chunk.
    All,
}

impl ChatScope {
    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Self::Chat(id) => Some(id),
            Self::All => None,
        }
    }
}

/// A chunk returned by vector search, nearest first.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarChunk {
    pub id: String,
    pub content: String,
    /// Raw metadata JSON as stored; older rows may lack fields.
    pub metadata: serde_json::Value,
    /// Cosine distance to the query, in `[0, 2]`.
    pub distance: f64,
}

impl SimilarChunk {
    /// Cosine similarity `1 - distance`.
    pub fn similarity(&self) -> f64 {
        1.0 - self.distance
    }
}

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub chats: i64,
    pub messages: i64,
    pub chunks: i64,
    pub embedding_dimension: usize,
    pub db_path: String,
}

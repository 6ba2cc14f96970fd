//! Shared application state.

use std::sync::Arc;

use docchat_chat::LlmClient;
use docchat_core::{DocChatConfig, Result};
use docchat_embed::Embedder;
use docchat_store::{Chat, SqliteStore};

/// Title given to chats created implicitly by an upload or a message.
pub const NEW_CHAT_TITLE: &str = "New chat";

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: DocChatConfig,
    pub store: Arc<SqliteStore>,
    pub embedder: Arc<dyn Embedder>,
    pub llm: LlmClient,
}

impl AppState {
    pub fn new(
        config: DocChatConfig,
        store: SqliteStore,
        embedder: Arc<dyn Embedder>,
        llm: LlmClient,
    ) -> Self {
        Self {
            config,
            store: Arc::new(store),
            embedder,
            llm,
        }
    }

    /// The requested chat id, or the configured default when absent or blank.
    pub fn resolve_chat_id(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.config.default_chat_id.as_str())
            .to_string()
    }

    /// Make sure the chat row exists before anything is attached to it.
    pub fn ensure_chat(&self, chat_id: &str) -> Result<Chat> {
        let title = if chat_id == self.config.default_chat_id {
            self.config.default_chat_title.as_str()
        } else {
            NEW_CHAT_TITLE
        };
        self.store.ensure_chat(chat_id, title)
    }
}

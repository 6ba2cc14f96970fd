//! `searchInRAG` exposed as an agent tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::search::search_in_rag;
use crate::types::RagSearchOutcome;
use docchat_chat::{ToolDefinition, ToolHandler};
use docchat_embed::Embedder;
use docchat_store::{ChatScope, SqliteStore};

pub const TOOL_NAME: &str = "searchInRAG";

const DESCRIPTION: &str = "Searches the vector database of documents uploaded to this chat. \
Use this tool ALWAYS when the user asks about uploaded documents or needs context from them. \
CRITICAL: 'query' must NEVER be empty. It must contain keywords, phrases or the main topic you are looking for.";

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchArgs {
    query: String,
}

/// Retrieval tool bound to one chat's documents.
pub struct SearchInRagTool {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
    scope: ChatScope,
    top_k: usize,
}

impl SearchInRagTool {
    pub fn new(
        store: Arc<SqliteStore>,
        embedder: Arc<dyn Embedder>,
        scope: ChatScope,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            scope,
            top_k,
        }
    }

    pub async fn search(&self, query: &str) -> RagSearchOutcome {
        search_in_rag(&self.store, self.embedder.as_ref(), query, &self.scope, self.top_k).await
    }
}

#[async_trait]
impl ToolHandler for SearchInRagTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: DESCRIPTION.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"],
                "additionalProperties": false,
            }),
            strict: true,
        }
    }

    async fn call(&self, args: Value) -> Value {
        let outcome = match serde_json::from_value::<SearchArgs>(args) {
            Ok(parsed) => self.search(&parsed.query).await,
            Err(e) => {
                warn!("Invalid {} arguments: {}", TOOL_NAME, e);
                RagSearchOutcome::failed(format!("Invalid arguments for {}: {}", TOOL_NAME, e))
            }
        };
        outcome.to_value()
    }
}

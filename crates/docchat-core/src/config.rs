//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";
/// Dimensionality requested from the embedding model and enforced by the store.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

pub const DEFAULT_CHAT_ID: &str = "chat-default";
pub const DEFAULT_CHAT_TITLE: &str = "Main RAG chat";

pub const DEFAULT_MAX_CHUNK_LEN: usize = 800;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_SEARCH_TOP_K: usize = 5;
/// Upper bound on chunks returned by one retrieval, whatever the caller asks.
pub const MAX_SEARCH_TOP_K: usize = 50;
pub const DEFAULT_MAX_AGENT_STEPS: usize = 5;

/// Paths to all DocChat data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// SQLite database directory (`data/vectordb/`).
    pub vectordb: PathBuf,
    /// Scratch space for uploads being ingested (`data/tmp-uploads/`).
    pub tmp_uploads: PathBuf,
    /// Provider settings (`data/provider.json`).
    pub provider_file: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            vectordb: root.join("vectordb"),
            tmp_uploads: root.join("tmp-uploads"),
            provider_file: root.join("provider.json"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.vectordb)?;
        std::fs::create_dir_all(&self.tmp_uploads)?;
        Ok(())
    }
}

/// Settings for the OpenAI-compatible provider serving both embeddings and
/// chat completions (persisted to `provider.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
    #[serde(default)]
    pub temperature: Option<f64>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}
fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.into()
}
fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.into()
}
fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            temperature: None,
        }
    }
}

impl ProviderSettings {
    /// Load settings from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let from_file = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str::<ProviderSettings>(&s).ok());
        if from_file.is_some() {
            info!("Loaded provider settings from {}", config_path.display());
        }
        let mut settings = from_file.unwrap_or_default();

        if settings.api_key.is_none() {
            settings.api_key = std::env::var("OPENROUTER_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        if let Ok(base) = std::env::var("DOCCHAT_API_BASE") {
            settings.api_base = base;
        }
        if let Ok(model) = std::env::var("DOCCHAT_CHAT_MODEL") {
            settings.chat_model = model;
        }
        if let Ok(model) = std::env::var("DOCCHAT_EMBEDDING_MODEL") {
            settings.embedding_model = model;
        }

        settings
    }

    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}

/// Top-level DocChat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChatConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Embedding and completion provider.
    pub provider: ProviderSettings,
    /// Chat that uploads, searches and messages fall back to when the
    /// client names none.
    pub default_chat_id: String,
    pub default_chat_title: String,
    /// Maximum chunk length in characters.
    pub max_chunk_len: usize,
    /// Upload size ceiling in bytes.
    pub max_upload_bytes: usize,
    /// Number of chunks returned by a retrieval.
    pub search_top_k: usize,
    /// Maximum model round-trips per chat request.
    pub max_agent_steps: usize,
}

impl DocChatConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let default_chat_id = std::env::var("DOCCHAT_DEFAULT_CHAT_ID")
            .ok()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CHAT_ID.to_string());

        let data_paths = DataPaths::new(data_dir)?;
        let provider = ProviderSettings::load(&data_paths.provider_file);

        Ok(Self {
            port,
            data_paths,
            provider,
            default_chat_id,
            ..Self::defaults_for(PathBuf::new())
        })
    }

    /// Configuration with every default and the given data root, without
    /// touching the environment or the filesystem.
    pub fn defaults_for(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            port: DEFAULT_PORT,
            data_paths: DataPaths {
                vectordb: root.join("vectordb"),
                tmp_uploads: root.join("tmp-uploads"),
                provider_file: root.join("provider.json"),
                root,
            },
            provider: ProviderSettings::default(),
            default_chat_id: DEFAULT_CHAT_ID.into(),
            default_chat_title: DEFAULT_CHAT_TITLE.into(),
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            search_top_k: DEFAULT_SEARCH_TOP_K,
            max_agent_steps: DEFAULT_MAX_AGENT_STEPS,
        }
    }
}

//! DocChat: chat with your documents over a single HTTP binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use docchat_chat::LlmClient;
use docchat_core::DocChatConfig;
use docchat_ingest::{Ingester, SmartChunker};
use docchat_server::{build_router, AppState};
use docchat_store::SqliteStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("DOCCHAT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

fn print_help() {
    println!("DocChat: retrieval-augmented chat over uploaded documents");
    println!();
    println!("Usage: docchat [command]");
    println!();
    println!("Commands:");
    println!("  (none)                    Start the server");
    println!("  ingest <file> [chat-id]   Index a local file into a chat");
    println!("  help                      Show this help message");
    println!();
    println!("Environment:");
    println!("  PORT, DOCCHAT_DATA_DIR, DOCCHAT_DEFAULT_CHAT_ID, OPENROUTER_API_KEY,");
    println!("  DOCCHAT_API_BASE, DOCCHAT_CHAT_MODEL, DOCCHAT_EMBEDDING_MODEL, RUST_LOG");
}

fn open_store(config: &DocChatConfig) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::open(
        &config.data_paths.vectordb,
        config.provider.embedding_dimensions,
    )
    .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    store
        .ensure_chat(&config.default_chat_id, &config.default_chat_title)
        .map_err(|e| anyhow::anyhow!("Failed to create default chat: {}", e))?;
    Ok(store)
}

async fn ingest_command(config: &DocChatConfig, path: &Path, chat_id: Option<&str>) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let embedder = docchat_embed::create_embedder(&config.provider);
    let chat_id = chat_id.unwrap_or(config.default_chat_id.as_str());
    store
        .ensure_chat(chat_id, docchat_server::state::NEW_CHAT_TITLE)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid file path: {}", path.display()))?;

    let ingester = Ingester::new(
        &store,
        embedder.as_ref(),
        SmartChunker::new(config.max_chunk_len),
    );
    let report = ingester
        .ingest_file(path, file_name, chat_id)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!(
        "Indexed {}: {}/{} chunks, {} characters",
        report.file_name, report.chunks_processed, report.total_chunks, report.text_length
    );
    for err in &report.errors {
        println!("  {}", err);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let data_dir = resolve_data_dir();
    let config = DocChatConfig::from_env(&data_dir)?;

    if args.len() > 1 {
        match args[1].as_str() {
            "ingest" => {
                let Some(path) = args.get(2) else {
                    eprintln!("Usage: docchat ingest <file> [chat-id]");
                    std::process::exit(1);
                };
                return ingest_command(&config, Path::new(path), args.get(3).map(String::as_str)).await;
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown command: {}. Use 'docchat help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    info!("Data directory: {}", data_dir.display());

    let store = open_store(&config)?;
    let embedder = docchat_embed::create_embedder(&config.provider);
    let llm = LlmClient::from_settings(&config.provider);
    if !llm.is_configured() {
        warn!("OPENROUTER_API_KEY is not set; /api/chat will answer 503");
    }
    info!("Chat model: {}", llm.model());

    let port = config.port;
    let state = Arc::new(AppState::new(config, store, embedder, llm));
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("DocChat server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

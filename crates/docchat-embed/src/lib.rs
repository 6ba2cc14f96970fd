//! DocChat Embed: embedding backends.
//!
//! Provides the `Embedder` trait for generating embeddings. The only
//! production backend is `RemoteEmbedder`, which calls an OpenAI-compatible
//! `/embeddings` endpoint once per input string.

pub mod embedder;
pub mod remote;

pub use embedder::Embedder;
pub use remote::RemoteEmbedder;

use std::sync::Arc;

use docchat_core::ProviderSettings;

/// Create the embedder described by the provider settings.
pub fn create_embedder(settings: &ProviderSettings) -> Arc<dyn Embedder> {
    if settings.api_key.is_none() {
        tracing::warn!("No embedding API key configured; embedding requests will be rejected upstream");
    }
    tracing::info!(
        "Using remote embedder {} (dim={}) at {}",
        settings.embedding_model,
        settings.embedding_dimensions,
        settings.api_base()
    );
    Arc::new(RemoteEmbedder::from_settings(settings))
}

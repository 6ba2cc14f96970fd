//! Embedding engine trait.

use async_trait::async_trait;
use docchat_core::Result;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Model identifier sent to the provider.
    fn model(&self) -> &str;
}

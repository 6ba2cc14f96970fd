//! OpenAI-compatible remote embedder (OpenRouter by default).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedder::Embedder;
use docchat_core::{Error, ProviderSettings, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

/// Embedder that issues one `POST {base}/embeddings` per text. No retries.
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(
        api_base: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/embeddings", api_base.trim_end_matches('/')),
            api_key,
            model: model.into(),
            dimensions,
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(
            settings.api_base(),
            settings.api_key.clone(),
            settings.embedding_model.clone(),
            settings.embedding_dimensions,
        )
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: self.dimensions,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        debug!("Embedding {} chars with {}", text.chars().count(), self.model);

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Embedding API returned {}: {}", status, body);
            return Err(Error::EmbeddingHttp {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("Embedding response read failed: {}", e)))?;

        let embedding = serde_json::from_str::<EmbeddingResponse>(&raw)
            .ok()
            .and_then(|parsed| parsed.data.into_iter().next())
            .and_then(|first| first.embedding)
            .ok_or_else(|| Error::MalformedEmbedding(excerpt(&raw)))?;

        if embedding.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    }
}

//! Retrieval result types, serialized in the shape the model reads.

use serde::Serialize;
use serde_json::Value;

use docchat_store::SimilarChunk;

/// Source name used when a chunk has no `fileName`.
pub const UNTITLED_SOURCE: &str = "Untitled document";

const NOT_AVAILABLE: &str = "N/A";

/// Chunk position and provenance. Missing values read `"N/A"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadataView {
    pub chunk_index: Value,
    pub total_chunks: Value,
    pub chunk_length: u64,
    pub uploaded_at: Value,
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagResult {
    /// 1-based.
    pub rank: usize,
    pub source: String,
    pub content: String,
    /// Percentage in `[0, 100]`, two decimals.
    pub similarity_score: f64,
    pub chunk_metadata: ChunkMetadataView,
    pub document_id: String,
}

impl RagResult {
    pub fn from_chunk(rank: usize, chunk: SimilarChunk) -> Self {
        let meta = &chunk.metadata;

        let chunk_metadata = ChunkMetadataView {
            chunk_index: present_or_na(&meta["chunkIndex"]),
            total_chunks: present_or_na(&meta["totalChunks"]),
            chunk_length: meta["chunkLength"]
                .as_u64()
                .filter(|len| *len > 0)
                .unwrap_or_else(|| chunk.content.chars().count() as u64),
            uploaded_at: meta["uploadedAt"]
                .as_str()
                .filter(|s| !s.is_empty())
                .map(Value::from)
                .unwrap_or_else(|| Value::from(NOT_AVAILABLE)),
        };

        let source = meta["fileName"]
            .as_str()
            .filter(|s| !s.is_empty())
            .unwrap_or(UNTITLED_SOURCE)
            .to_string();

        Self {
            rank,
            source,
            similarity_score: similarity_score(chunk.distance),
            chunk_metadata,
            document_id: chunk.id,
            content: chunk.content,
        }
    }
}

/// `round(clamp(1 - distance, 0, 1) * 10000) / 100`.
pub fn similarity_score(distance: f64) -> f64 {
    let similarity = (1.0 - distance).clamp(0.0, 1.0);
    (similarity * 10000.0).round() / 100.0
}

fn present_or_na(value: &Value) -> Value {
    if value.is_null() {
        Value::from(NOT_AVAILABLE)
    } else {
        value.clone()
    }
}

/// Result of a retrieval, as handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RagSearchOutcome {
    Found {
        query: String,
        #[serde(rename = "totalResults")]
        total_results: usize,
        results: Vec<RagResult>,
    },
    Failed {
        /// Always empty.
        results: Vec<RagResult>,
        error: String,
    },
}

impl RagSearchOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            results: Vec::new(),
            error: error.into(),
        }
    }

    pub fn results(&self) -> &[RagResult] {
        match self {
            Self::Found { results, .. } | Self::Failed { results, .. } => results,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(metadata: Value, distance: f64) -> SimilarChunk {
        SimilarChunk {
            id: "doc-1".into(),
            content: "héllo world".into(),
            metadata,
            distance,
        }
    }

    #[test]
    fn test_similarity_score_bounds() {
        assert_eq!(similarity_score(0.0), 100.0);
        assert_eq!(similarity_score(1.0), 0.0);
        assert_eq!(similarity_score(1.7), 0.0);
        assert_eq!(similarity_score(-0.0001), 100.0);
        assert_eq!(similarity_score(0.123456), 87.65);
    }

    #[test]
    fn test_full_metadata_is_copied() {
        let result = RagResult::from_chunk(
            1,
            chunk(
                json!({"fileName": "a.pdf", "chunkIndex": 0, "totalChunks": 4, "chunkLength": 42, "uploadedAt": "2024-01-01T00:00:00Z"}),
                0.25,
            ),
        );
        assert_eq!(result.source, "a.pdf");
        assert_eq!(result.similarity_score, 75.0);
        assert_eq!(result.chunk_metadata.chunk_index, json!(0));
        assert_eq!(result.chunk_metadata.total_chunks, json!(4));
        assert_eq!(result.chunk_metadata.chunk_length, 42);
        assert_eq!(result.document_id, "doc-1");
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let result = RagResult::from_chunk(3, chunk(json!({}), 0.5));
        assert_eq!(result.source, UNTITLED_SOURCE);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["rank"], 3);
        assert_eq!(value["chunkMetadata"]["chunkIndex"], "N/A");
        assert_eq!(value["chunkMetadata"]["totalChunks"], "N/A");
        assert_eq!(value["chunkMetadata"]["uploadedAt"], "N/A");
        // Falls back to the content's character count.
        assert_eq!(value["chunkMetadata"]["chunkLength"], 11);
        assert_eq!(value["similarityScore"], 50.0);
    }

    #[test]
    fn test_outcome_shapes() {
        let found = RagSearchOutcome::Found {
            query: "q".into(),
            total_results: 0,
            results: Vec::new(),
        };
        assert_eq!(found.to_value(), json!({"query": "q", "totalResults": 0, "results": []}));

        let failed = RagSearchOutcome::failed("nope");
        assert_eq!(failed.to_value(), json!({"results": [], "error": "nope"}));
    }
}

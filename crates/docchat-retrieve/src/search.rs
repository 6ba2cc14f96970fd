//! Query embedding plus vector search, with soft failure.

use tracing::{error, info, warn};

use crate::types::{RagResult, RagSearchOutcome};
use docchat_core::config::MAX_SEARCH_TOP_K;
use docchat_core::Error;
use docchat_embed::Embedder;
use docchat_store::{ChatScope, SqliteStore};

/// Search the chunks visible in `scope` for the `top_k` nearest to `query`.
pub async fn search_in_rag(
    store: &SqliteStore,
    embedder: &dyn Embedder,
    query: &str,
    scope: &ChatScope,
    top_k: usize,
) -> RagSearchOutcome {
    if query.trim().is_empty() {
        warn!("RAG search called with an empty query");
        return RagSearchOutcome::failed(Error::EmptyQuery.to_string());
    }

    info!(
        "RAG search for {:?} (scope: {})",
        query,
        scope.chat_id().unwrap_or("all chats")
    );

    let embedding = match embedder.embed(query).await {
        Ok(v) => v,
        Err(e) => {
            error!("Query embedding failed: {}", e);
            return RagSearchOutcome::failed(describe_embedding_error(&e));
        }
    };

    let hits = match store.search_similar(&embedding, scope, top_k.min(MAX_SEARCH_TOP_K)) {
        Ok(hits) => hits,
        Err(e) => {
            error!("Vector search failed: {}", e);
            return RagSearchOutcome::failed(format!("RAG search failed: {}", e));
        }
    };

    info!("Found {} results", hits.len());

    let results: Vec<RagResult> = hits
        .into_iter()
        .enumerate()
        .map(|(i, hit)| RagResult::from_chunk(i + 1, hit))
        .collect();

    RagSearchOutcome::Found {
        query: query.to_string(),
        total_results: results.len(),
        results,
    }
}

fn describe_embedding_error(e: &Error) -> String {
    match e {
        Error::EmbeddingHttp { status, .. } => format!("Failed to generate embedding: {}", status),
        Error::MalformedEmbedding(_) => "Unexpected response from the embedding service".to_string(),
        other => format!("RAG search failed: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docchat_core::Result;
    use docchat_store::{ChunkMetadata, NewDocumentChunk};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Maps known words to fixed unit vectors.
    struct KeywordEmbedder {
        calls: AtomicUsize,
        fail_with: Option<u16>,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.fail_with {
                return Err(Error::EmbeddingHttp {
                    status,
                    body: "nope".into(),
                });
            }
            Ok(if text.contains("apple") {
                vec![1.0, 0.1, 0.0]
            } else if text.contains("pear") {
                vec![0.1, 1.0, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            })
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model(&self) -> &str {
            "keywords"
        }
    }

    fn seeded_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), 3).unwrap();
        store.ensure_chat("c1", "One").unwrap();
        store.ensure_chat("c2", "Two").unwrap();

        let rows: [(&str, &str, [f32; 3]); 4] = [
            ("c1", "All about apples.", [1.0, 0.0, 0.0]),
            ("c1", "All about pears.", [0.0, 1.0, 0.0]),
            ("c1", "Mostly apples, some pears.", [0.7, 0.7, 0.0]),
            ("c2", "Apples in another chat.", [1.0, 0.0, 0.0]),
        ];
        for (i, (chat, content, vector)) in rows.iter().enumerate() {
            let metadata = ChunkMetadata {
                file_name: "fruit.txt".into(),
                chunk_index: i,
                total_chunks: rows.len(),
                chunk_length: content.chars().count(),
                uploaded_at: "2024-05-01T10:00:00+00:00".into(),
            };
            store
                .add_chunk(&NewDocumentChunk {
                    chat_id: chat,
                    content,
                    embedding: vector,
                    metadata: &metadata,
                })
                .unwrap();
        }
        (dir, store)
    }

    #[tokio::test]
    async fn test_blank_query_skips_embedding() {
        let (_dir, store) = seeded_store();
        let embedder = KeywordEmbedder::new();

        let outcome = search_in_rag(&store, &embedder, "  \t ", &ChatScope::All, 5).await;
        match &outcome {
            RagSearchOutcome::Failed { results, error } => {
                assert!(results.is_empty());
                assert!(error.contains("Infer a topic"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_nearest_chunk_ranks_first_within_scope() {
        let (_dir, store) = seeded_store();
        let embedder = KeywordEmbedder::new();

        let outcome = search_in_rag(&store, &embedder, "apple", &ChatScope::Chat("c1".into()), 5).await;
        let results = outcome.results();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].content, "All about apples.");
        assert_eq!(results[1].content, "Mostly apples, some pears.");
        assert_eq!(results[2].content, "All about pears.");
        assert!(results.iter().all(|r| !r.content.contains("another chat")));

        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        for pair in results.windows(2) {
            assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
        assert!(results
            .iter()
            .all(|r| (0.0..=100.0).contains(&r.similarity_score)));

        match &outcome {
            RagSearchOutcome::Found {
                query,
                total_results,
                ..
            } => {
                assert_eq!(query, "apple");
                assert_eq!(*total_results, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_top_k_and_all_scope() {
        let (_dir, store) = seeded_store();
        let embedder = KeywordEmbedder::new();

        let outcome = search_in_rag(&store, &embedder, "apple", &ChatScope::All, 2).await;
        let results = outcome.results();
        assert_eq!(results.len(), 2);
        // The two exact apple vectors tie at the top.
        assert!(results.iter().all(|r| r.content.contains("pples")));
        assert_eq!(results[0].similarity_score, results[1].similarity_score);
    }

    #[tokio::test]
    async fn test_top_k_is_capped() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), 3).unwrap();
        store.ensure_chat("c1", "One").unwrap();
        let total = MAX_SEARCH_TOP_K + 5;
        for i in 0..total {
            let metadata = ChunkMetadata {
                file_name: "many.txt".into(),
                chunk_index: i,
                total_chunks: total,
                chunk_length: 12,
                uploaded_at: "2024-05-01T10:00:00+00:00".into(),
            };
            store
                .add_chunk(&NewDocumentChunk {
                    chat_id: "c1",
                    content: "Apple chunk.",
                    embedding: &[1.0, 0.0, 0.0],
                    metadata: &metadata,
                })
                .unwrap();
        }

        let embedder = KeywordEmbedder::new();
        let outcome = search_in_rag(&store, &embedder, "apple", &ChatScope::All, usize::MAX).await;
        assert_eq!(outcome.results().len(), MAX_SEARCH_TOP_K);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_soft() {
        let (_dir, store) = seeded_store();
        let embedder = KeywordEmbedder {
            calls: AtomicUsize::new(0),
            fail_with: Some(429),
        };

        let outcome = search_in_rag(&store, &embedder, "apple", &ChatScope::All, 5).await;
        assert_eq!(
            outcome,
            RagSearchOutcome::failed("Failed to generate embedding: 429")
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_soft() {
        let (_dir, store) = seeded_store();

        /// Returns vectors of the wrong width for this store.
        struct WideEmbedder;

        #[async_trait]
        impl Embedder for WideEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Ok(vec![0.5; 8])
            }
            fn dimension(&self) -> usize {
                8
            }
            fn model(&self) -> &str {
                "wide"
            }
        }

        let outcome = search_in_rag(&store, &WideEmbedder, "apple", &ChatScope::All, 5).await;
        match outcome {
            RagSearchOutcome::Failed { results, error } => {
                assert!(results.is_empty());
                assert!(error.starts_with("RAG search failed"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}

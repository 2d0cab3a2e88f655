//! The ingestion call chain: structure → embed → store.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::Error as ServiceError;
use crate::knowledge::embeddings::EmbeddingService;
use crate::knowledge::record::{KnowledgeRecord, SourceType};
use crate::knowledge::structuring::StructuringClient;
use crate::knowledge::vector_db::VectorStore;
use crate::metrics;

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct StoredKnowledge {
    pub id: Uuid,
    pub record: KnowledgeRecord,
}

/// Failure tagged with the pipeline stage that short-circuited.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("structuring failed: {0}")]
    Structuring(#[source] ServiceError),

    #[error("embedding failed: {0}")]
    Embedding(#[source] ServiceError),

    #[error("storage failed: {0}")]
    Storage(#[source] ServiceError),
}

impl IngestError {
    /// Stage label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::Structuring(_) => "structuring",
            IngestError::Embedding(_) => "embedding",
            IngestError::Storage(_) => "storage",
        }
    }

    /// Message shown to the end user for this stage.
    pub fn user_message(&self) -> &'static str {
        match self {
            IngestError::Structuring(_) => {
                "Error: I could not convert your text into a structured knowledge record."
            }
            IngestError::Embedding(_) => {
                "Error: I could not generate a semantic embedding for this knowledge."
            }
            IngestError::Storage(_) => "Error: saving the knowledge to the database failed.",
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        match self {
            IngestError::Structuring(e) | IngestError::Embedding(e) | IngestError::Storage(e) => {
                e.is_rate_limit()
            }
        }
    }
}

/// One ingestion per inbound item; no retries, no compensation on
/// partial failure.
#[derive(Clone)]
pub struct IngestPipeline {
    structuring: StructuringClient,
    embeddings: EmbeddingService,
    store: Arc<VectorStore>,
}

impl IngestPipeline {
    pub fn new(
        structuring: StructuringClient,
        embeddings: EmbeddingService,
        store: Arc<VectorStore>,
    ) -> Self {
        Self {
            structuring,
            embeddings,
            store,
        }
    }

    /// Run the full chain for one raw text. Short-circuits on the
    /// first failing stage.
    pub async fn ingest(
        &self,
        raw_text: &str,
        source: SourceType,
    ) -> Result<StoredKnowledge, IngestError> {
        let started = Instant::now();
        metrics::record_pipeline_start("ingest");

        let result = self.run(raw_text, source).await;

        match &result {
            Ok(stored) => {
                info!(
                    "Ingested '{}' as {} ({})",
                    stored.record.core_content.title, stored.id, source
                );
            }
            Err(e) => {
                error!("Ingestion aborted at {} stage: {}", e.stage(), e);
                metrics::record_ingest_stage_failure(e.stage());
            }
        }

        metrics::record_pipeline_result("ingest", started.elapsed(), result.is_ok());
        result
    }

    async fn run(
        &self,
        raw_text: &str,
        source: SourceType,
    ) -> Result<StoredKnowledge, IngestError> {
        let record = self
            .structuring
            .structure(raw_text, source)
            .await
            .map_err(IngestError::Structuring)?;

        let vector = self
            .embeddings
            .embed_document(&record)
            .await
            .map_err(IngestError::Embedding)?;

        let id = self
            .store
            .upsert(&record, vector)
            .await
            .map_err(IngestError::Storage)?;

        Ok(StoredKnowledge { id, record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::integrations::GeminiClient;
    use httpmock::prelude::*;

    fn pipeline(server: &MockServer) -> IngestPipeline {
        let gemini = GeminiClient::new("test_key", "gemini-2.0-flash")
            .expect("client")
            .with_base_url(&server.base_url());

        let settings = Settings {
            // Dead port: any store call would fail loudly, none may happen
            qdrant_url: "http://localhost:1".to_string(),
            ..Settings::default()
        };

        let structuring = StructuringClient::new(gemini.clone()).expect("structuring");
        let embeddings = EmbeddingService::new(gemini, &settings);
        let store = Arc::new(VectorStore::new(&settings).expect("store"));

        IngestPipeline::new(structuring, embeddings, store)
    }

    #[tokio::test]
    async fn ingest_aborts_on_empty_text_without_any_network_call() {
        let server = MockServer::start_async().await;

        let generate_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent");
            then.status(200).body("{}");
        });
        let embed_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent");
            then.status(200).body("{}");
        });

        let err = pipeline(&server)
            .ingest("", SourceType::TelegramTextMessage)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Structuring(_)));
        generate_mock.assert_calls(0);
        embed_mock.assert_calls(0);
    }

    #[tokio::test]
    async fn ingest_short_circuits_before_embedding_on_structuring_failure() {
        let server = MockServer::start_async().await;

        let generate_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent");
            then.status(200).json_body(serde_json::json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [ { "text": "not json at all" } ] } }
                ]
            }));
        });
        let embed_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent");
            then.status(200).body("{}");
        });

        let err = pipeline(&server)
            .ingest("a perfectly fine note", SourceType::PersonalThought)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Structuring(_)));
        assert_eq!(err.stage(), "structuring");
        generate_mock.assert_calls(1);
        embed_mock.assert_calls(0);
    }

    #[tokio::test]
    async fn ingest_reports_embedding_stage_on_embed_failure() {
        let server = MockServer::start_async().await;

        let record_json =
            serde_json::to_string(&crate::knowledge::record::sample_record()).unwrap();
        server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent");
            then.status(200).json_body(serde_json::json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [ { "text": record_json } ] } }
                ]
            }));
        });
        let embed_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent");
            then.status(503).body("overloaded");
        });

        let err = pipeline(&server)
            .ingest("a perfectly fine note", SourceType::PersonalThought)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Embedding(_)));
        assert_eq!(err.stage(), "embedding");
        embed_mock.assert_calls(1);
    }

    #[test]
    fn test_user_messages_are_stage_specific() {
        let structuring =
            IngestError::Structuring(ServiceError::MalformedResponse("x".to_string()));
        let embedding = IngestError::Embedding(ServiceError::GeminiError("x".to_string()));
        let storage = IngestError::Storage(ServiceError::VectorStoreError("x".to_string()));

        assert!(structuring.user_message().contains("structured knowledge"));
        assert!(embedding.user_message().contains("embedding"));
        assert!(storage.user_message().contains("database"));
    }

    #[test]
    fn test_rate_limit_detection_passes_through_stages() {
        let err = IngestError::Structuring(ServiceError::RateLimited("429".to_string()));
        assert!(err.is_rate_limit());

        let err = IngestError::Storage(ServiceError::VectorStoreError("down".to_string()));
        assert!(!err.is_rate_limit());
    }
}

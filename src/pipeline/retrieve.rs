//! The retrieval call chain: embed query → search → answer generation.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::integrations::GeminiClient;
use crate::knowledge::embeddings::EmbeddingService;
use crate::knowledge::vector_db::{ScoredRecord, VectorStore};
use crate::metrics;
use crate::prompts::Prompt;

/// Substituted for the context block when nothing relevant is stored.
pub const NO_CONTEXT_MARKER: &str = "No relevant notes were found in the knowledge base.";

/// Returned when answer generation itself fails.
pub const ANSWER_FAILURE_MESSAGE: &str =
    "Sorry, I could not generate an answer right now. Please try again later.";

/// Returned when the question could not be embedded.
pub const QUERY_FAILURE_MESSAGE: &str =
    "Sorry, I could not process your question right now. Please try again later.";

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUERY_PLACEHOLDER: &str = "{user_query}";

/// Answers questions over the stored knowledge.
#[derive(Clone)]
pub struct RetrievalPipeline {
    gemini: GeminiClient,
    embeddings: EmbeddingService,
    store: Arc<VectorStore>,
    template: String,
    top_k: u64,
    similarity_threshold: Option<f32>,
}

impl RetrievalPipeline {
    /// Create the pipeline, loading the answer template once.
    /// A missing template aborts startup.
    pub fn new(
        gemini: GeminiClient,
        embeddings: EmbeddingService,
        store: Arc<VectorStore>,
        settings: &Settings,
    ) -> Result<Self> {
        let template = Prompt::RagAnswer.load()?;
        if !template.contains(CONTEXT_PLACEHOLDER) || !template.contains(QUERY_PLACEHOLDER) {
            return Err(Error::PromptNotFound(format!(
                "{} lacks the {} or {} placeholder",
                Prompt::RagAnswer.filename(),
                CONTEXT_PLACEHOLDER,
                QUERY_PLACEHOLDER
            )));
        }

        Ok(Self {
            gemini,
            embeddings,
            store,
            template,
            top_k: settings.top_k,
            similarity_threshold: settings.similarity_threshold,
        })
    }

    /// Answer a question. Always returns a user-facing string; store
    /// failures degrade to "no results", generation failures to a
    /// fixed apology.
    pub async fn answer(&self, query: &str) -> String {
        let started = Instant::now();
        metrics::record_pipeline_start("retrieval");

        let (reply, success) = self.run(query).await;

        metrics::record_pipeline_result("retrieval", started.elapsed(), success);
        reply
    }

    async fn run(&self, query: &str) -> (String, bool) {
        let vector = match self.embeddings.embed_query(query).await {
            Ok(vector) => vector,
            Err(e) => {
                error!("Failed to embed query: {}", e);
                return (QUERY_FAILURE_MESSAGE.to_string(), false);
            }
        };

        // An unavailable store is indistinguishable from "nothing
        // stored" for the user; answer from general knowledge instead.
        let matches = match self
            .store
            .search(vector, self.top_k, self.similarity_threshold)
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Knowledge search failed, answering without context: {}", e);
                Vec::new()
            }
        };

        let context = build_context(&matches);
        let prompt = self
            .template
            .replace(CONTEXT_PLACEHOLDER, &context)
            .replace(QUERY_PLACEHOLDER, query);

        match self.gemini.generate(&prompt).await {
            Ok(answer) => (answer, true),
            Err(e) => {
                error!("Answer generation failed: {}", e);
                (ANSWER_FAILURE_MESSAGE.to_string(), false)
            }
        }
    }
}

/// Compact context block: title and summary per match, rank order,
/// delimiter between entries.
fn build_context(matches: &[ScoredRecord]) -> String {
    if matches.is_empty() {
        return NO_CONTEXT_MARKER.to_string();
    }

    matches
        .iter()
        .map(|hit| {
            format!(
                "Title: {}\nSummary: {}",
                hit.record.core_content.title, hit.record.core_content.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::record::sample_record;
    use httpmock::prelude::*;
    use serde_json::json;

    fn pipeline(server: &MockServer) -> RetrievalPipeline {
        let gemini = GeminiClient::new("test_key", "gemini-2.0-flash")
            .expect("client")
            .with_base_url(&server.base_url());

        let settings = Settings {
            qdrant_url: "http://localhost:1".to_string(),
            ..Settings::default()
        };

        let embeddings = EmbeddingService::new(gemini.clone(), &settings);
        let store = Arc::new(VectorStore::new(&settings).expect("store"));

        RetrievalPipeline::new(gemini, embeddings, store, &settings).expect("pipeline")
    }

    fn hit(title: &str, summary: &str, score: f32) -> ScoredRecord {
        let mut record = sample_record();
        record.core_content.title = title.to_string();
        record.core_content.summary = summary.to_string();
        ScoredRecord {
            id: None,
            record,
            score,
        }
    }

    #[test]
    fn test_build_context_preserves_rank_order_and_delimits() {
        let matches = vec![
            hit("First", "Best match.", 0.92),
            hit("Second", "Close match.", 0.81),
            hit("Third", "Weaker match.", 0.74),
        ];

        let context = build_context(&matches);
        let first = context.find("First").unwrap();
        let second = context.find("Second").unwrap();
        let third = context.find("Third").unwrap();

        assert!(first < second && second < third);
        assert_eq!(context.matches("\n---\n").count(), 2);
        assert!(context.contains("Title: First\nSummary: Best match."));
    }

    #[test]
    fn test_build_context_empty_yields_marker() {
        assert_eq!(build_context(&[]), NO_CONTEXT_MARKER);
    }

    #[tokio::test]
    async fn answer_without_matches_still_produces_text() {
        let server = MockServer::start_async().await;

        // An empty embedding makes the search return nothing without
        // touching the (dead) store.
        let embed_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent");
            then.status(200).json_body(json!({ "embedding": { "values": [] } }));
        });

        let generate_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent")
                .is_true(|req| {
                    let body = String::from_utf8_lossy(req.body().as_ref());
                    body.contains("No relevant notes were found")
                        && body.contains("پرسش بدون نتیجه")
                });
            then.status(200).json_body(json!({
                "candidates": [
                    { "content": { "role": "model", "parts": [
                        { "text": "I found nothing in your second brain, but generally..." }
                    ] } }
                ]
            }));
        });

        let reply = pipeline(&server).answer("پرسش بدون نتیجه").await;

        assert!(!reply.is_empty());
        assert!(reply.contains("nothing in your second brain"));
        embed_mock.assert_calls(1);
        generate_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn answer_returns_apology_when_generation_fails() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST)
                .path("/models/gemini-2.0-flash:generateContent");
            then.status(500).body("boom");
        });

        let reply = pipeline(&server).answer("   ").await;
        assert_eq!(reply, ANSWER_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn answer_reports_query_failure_when_embedding_errors() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent");
            then.status(503).body("overloaded");
        });

        let reply = pipeline(&server).answer("a real question").await;
        assert_eq!(reply, QUERY_FAILURE_MESSAGE);
    }
}

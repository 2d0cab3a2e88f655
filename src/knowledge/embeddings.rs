//! Embedding generation for knowledge records and queries.

use tracing::{debug, warn};

use crate::config::{EmbeddingInput, Settings};
use crate::error::Result;
use crate::integrations::gemini::{EmbeddingTask, GeminiClient};
use crate::knowledge::record::KnowledgeRecord;

/// Service for generating text embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingService {
    gemini: GeminiClient,
    model: String,
    input: EmbeddingInput,
}

impl EmbeddingService {
    pub fn new(gemini: GeminiClient, settings: &Settings) -> Self {
        Self {
            gemini,
            model: settings.embedding_model.clone(),
            input: settings.embedding_input,
        }
    }

    /// Embed a structured record for storage.
    ///
    /// Embeds the compact title/summary(/tags) composition rather than
    /// the full original text, keeping the vector semantically dense.
    pub async fn embed_document(&self, record: &KnowledgeRecord) -> Result<Vec<f32>> {
        let text = flatten_newlines(&record.embedding_text(self.input));
        debug!("Embedding document of {} chars", text.len());
        self.gemini
            .embed_content(&self.model, &text, EmbeddingTask::Document)
            .await
    }

    /// Embed a user query for retrieval.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let text = flatten_newlines(query.trim());
        if text.is_empty() {
            warn!("Embedding requested for empty query");
            return Ok(Vec::new());
        }
        self.gemini
            .embed_content(&self.model, &text, EmbeddingTask::Query)
            .await
    }
}

/// The embedding endpoint treats newlines as semantic noise.
fn flatten_newlines(text: &str) -> String {
    text.replace('\n', " ")
}

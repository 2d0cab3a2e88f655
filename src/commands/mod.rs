//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI. The long-lived
//! service objects are built once here and passed by handle into every
//! pipeline call.

use std::sync::Arc;

use anyhow::Context;

use crate::config::{Secrets, Settings};
use crate::integrations::{GeminiClient, WhisperClient};
use crate::knowledge::{EmbeddingService, StructuringClient, VectorStore};
use crate::media::MediaExtractor;
use crate::pipeline::{IngestPipeline, RetrievalPipeline};

pub mod bot;
pub mod import;

/// The long-lived service objects, constructed once at process start.
#[derive(Clone)]
pub struct Services {
    pub ingest: Arc<IngestPipeline>,
    pub retrieval: Arc<RetrievalPipeline>,
    pub media: Arc<MediaExtractor>,
}

impl Services {
    /// Wire up all clients and pipelines. Fails fast on a missing
    /// prompt template or an unreachable vector store.
    pub async fn init(secrets: &Secrets, settings: &Settings) -> anyhow::Result<Self> {
        let gemini = GeminiClient::new(secrets.google_api_key.clone(), &settings.generative_model)
            .context("failed to create Gemini client")?;
        let whisper = WhisperClient::new(secrets.openai_api_key.clone())
            .context("failed to create Whisper client")?;

        let store = Arc::new(
            VectorStore::connect(settings)
                .await
                .context("failed to initialize the vector store")?,
        );

        let structuring =
            StructuringClient::new(gemini.clone()).context("failed to load structuring prompt")?;
        let embeddings = EmbeddingService::new(gemini.clone(), settings);

        let ingest = Arc::new(IngestPipeline::new(
            structuring,
            embeddings.clone(),
            store.clone(),
        ));
        let retrieval = Arc::new(
            RetrievalPipeline::new(gemini.clone(), embeddings, store, settings)
                .context("failed to load answer prompt")?,
        );
        let media = Arc::new(MediaExtractor::new(
            gemini,
            whisper,
            settings.voice_language.clone(),
        ));

        Ok(Self {
            ingest,
            retrieval,
            media,
        })
    }
}

//! Configuration for the Second Brain assistant
//!
//! Secrets are required and fail fast at startup; tunables come from
//! the environment with sensible defaults.

use std::env;

use tracing::warn;

use crate::error::{Error, Result};

/// Default Qdrant gRPC endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
/// Default Qdrant collection for knowledge entries.
pub const DEFAULT_COLLECTION: &str = "second_brain_knowledge";
/// Default embedding model and its vector dimension.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const DEFAULT_EMBEDDING_DIMENSION: u64 = 768;
/// Default generative model for structuring and answers.
pub const DEFAULT_GENERATIVE_MODEL: &str = "gemini-2.0-flash";
/// Default number of matches fed into answer generation.
pub const DEFAULT_TOP_K: u64 = 5;
/// Default batch-import budget (requests per minute).
pub const DEFAULT_IMPORT_RATE_PER_MINUTE: f64 = 10.0;
/// Default language hint for voice transcription.
pub const DEFAULT_VOICE_LANGUAGE: &str = "fa";

/// Required API credentials, loaded once at process start.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub telegram_bot_token: String,
    pub google_api_key: String,
    pub openai_api_key: String,
}

impl Secrets {
    /// Load all required secrets; any missing one aborts startup.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            telegram_bot_token: require("TELEGRAM_BOT_TOKEN")?,
            google_api_key: require("GOOGLE_API_KEY")?,
            openai_api_key: require("OPENAI_API_KEY")?,
        })
    }
}

fn require(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::MissingSecret(name.to_string())),
    }
}

/// What goes into a document embedding.
///
/// Tags add retrieval signal but also noise for short notes, so the
/// composition is an explicit switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingInput {
    TitleSummary,
    TitleSummaryTags,
}

impl EmbeddingInput {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "title_summary" => Some(EmbeddingInput::TitleSummary),
            "title_summary_tags" => Some(EmbeddingInput::TitleSummaryTags),
            _ => None,
        }
    }
}

/// Tunable parameters with environment overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Qdrant URL.
    pub qdrant_url: String,
    /// Qdrant collection name.
    pub collection_name: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Vector dimension the collection is created with.
    pub embedding_dimension: u64,
    /// Generative model for structuring and answer generation.
    pub generative_model: String,
    /// Number of nearest neighbours fed into answer generation.
    pub top_k: u64,
    /// Optional cosine-similarity cutoff for retrieval. `None` disables it.
    pub similarity_threshold: Option<f32>,
    /// Document embedding composition.
    pub embedding_input: EmbeddingInput,
    /// Language hint passed to Whisper.
    pub voice_language: String,
    /// Batch-import budget, requests per minute.
    pub import_rate_per_minute: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection_name: DEFAULT_COLLECTION.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            generative_model: DEFAULT_GENERATIVE_MODEL.to_string(),
            top_k: DEFAULT_TOP_K,
            similarity_threshold: None,
            embedding_input: EmbeddingInput::TitleSummaryTags,
            voice_language: DEFAULT_VOICE_LANGUAGE.to_string(),
            import_rate_per_minute: DEFAULT_IMPORT_RATE_PER_MINUTE,
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        Self {
            qdrant_url: env::var("QDRANT_URL").unwrap_or(defaults.qdrant_url),
            collection_name: env::var("QDRANT_COLLECTION").unwrap_or(defaults.collection_name),
            embedding_model: env::var("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", defaults.embedding_dimension),
            generative_model: env::var("GENERATIVE_MODEL").unwrap_or(defaults.generative_model),
            top_k: parse_env("RETRIEVAL_TOP_K", defaults.top_k),
            similarity_threshold: env::var("SIMILARITY_THRESHOLD")
                .ok()
                .and_then(|raw| match raw.parse::<f32>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring unparseable SIMILARITY_THRESHOLD: {}", raw);
                        None
                    }
                }),
            embedding_input: env::var("EMBEDDING_INPUT")
                .ok()
                .and_then(|raw| {
                    let parsed = EmbeddingInput::parse(&raw);
                    if parsed.is_none() {
                        warn!("Ignoring unknown EMBEDDING_INPUT: {}", raw);
                    }
                    parsed
                })
                .unwrap_or(defaults.embedding_input),
            voice_language: env::var("VOICE_LANGUAGE").unwrap_or(defaults.voice_language),
            import_rate_per_minute: parse_env(
                "IMPORT_RATE_PER_MINUTE",
                defaults.import_rate_per_minute,
            ),
        }
    }
}

fn parse_env<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable {}: {}", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

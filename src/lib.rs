//! Telegram Second Brain Library
//!
//! This library provides tools to:
//! - Structure raw text into a fixed knowledge schema with Gemini
//! - Embed structured knowledge and store it in Qdrant
//! - Answer questions over the stored knowledge (RAG)
//! - Run a Telegram bot front end for text, voice and photo input
//! - Batch-import a directory of notes, screenshots and recordings

pub mod config;
pub mod error;
pub mod integrations;
pub mod knowledge;
pub mod media;
pub mod metrics;
pub mod pipeline;
pub mod prompts;
pub mod ratelimit;

// Re-export common types
pub use config::{Secrets, Settings};
pub use error::{Error, Result};
pub use integrations::{GeminiClient, WhisperClient};
pub use knowledge::{EmbeddingService, KnowledgeRecord, StructuringClient, VectorStore};
pub use pipeline::{IngestPipeline, RetrievalPipeline};
pub use prompts::{load_prompt, Prompt};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;

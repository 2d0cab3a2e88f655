//! Knowledge pipeline building blocks.
//!
//! Provides:
//! - The structured knowledge schema and its flat metadata form
//! - Structuring of raw text via Gemini
//! - Document/query embeddings
//! - The Qdrant-backed knowledge store

pub mod embeddings;
pub mod record;
pub mod structuring;
pub mod vector_db;

pub use embeddings::EmbeddingService;
pub use record::{KnowledgeRecord, SourceType};
pub use structuring::StructuringClient;
pub use vector_db::{ScoredRecord, VectorStore};

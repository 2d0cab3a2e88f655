//! Error types for the Second Brain assistant

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    #[error("Prompt template not found: {0}")]
    PromptNotFound(String),

    #[error("Gemini API error: {0}")]
    GeminiError(String),

    #[error("Whisper API error: {0}")]
    WhisperError(String),

    #[error("Vector store error: {0}")]
    VectorStoreError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Telegram API error: {0}")]
    TelegramError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<qdrant_client::QdrantError> for Error {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Error::VectorStoreError(err.to_string())
    }
}

impl From<teloxide::RequestError> for Error {
    fn from(err: teloxide::RequestError) -> Self {
        Error::TelegramError(err.to_string())
    }
}

impl Error {
    /// True for HTTP 429 style failures, matched by batch import.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }
}

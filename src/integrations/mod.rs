//! External model integrations.
//!
//! Provides clients for:
//! - Google Gemini (text generation, vision OCR, embeddings)
//! - OpenAI Whisper (voice transcription)

pub mod gemini;
pub mod whisper;

pub use gemini::GeminiClient;
pub use whisper::WhisperClient;

//! Text extraction from media files.
//!
//! Shared between the Telegram bot (downloaded voice/photo files) and
//! batch import (files on disk). Each kind maps to one extraction path
//! and one source label.

use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::integrations::{GeminiClient, WhisperClient};
use crate::knowledge::record::SourceType;

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &["ogg", "oga", "mp3", "wav", "m4a"];
pub const SUPPORTED_TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Kind of file the extractor knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Text,
}

impl MediaKind {
    /// Classify by file extension; `None` means unsupported.
    pub fn classify(path: &Path) -> Option<MediaKind> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Audio)
        } else if SUPPORTED_TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Text)
        } else {
            None
        }
    }

    /// Source label attached to knowledge ingested from this kind.
    pub fn source_type(&self) -> SourceType {
        match self {
            MediaKind::Image => SourceType::Screenshot,
            MediaKind::Audio => SourceType::AudioFile,
            MediaKind::Text => SourceType::TextFile,
        }
    }
}

/// Text pulled out of a file, with the source label it implies.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub source_type: SourceType,
}

/// Turns media files into raw text.
#[derive(Debug, Clone)]
pub struct MediaExtractor {
    gemini: GeminiClient,
    whisper: WhisperClient,
    voice_language: String,
}

impl MediaExtractor {
    pub fn new(gemini: GeminiClient, whisper: WhisperClient, voice_language: String) -> Self {
        Self {
            gemini,
            whisper,
            voice_language,
        }
    }

    /// Extract text from a file by its kind. `None` means the file
    /// type is unsupported; empty extracted text is the caller's call.
    pub async fn extract(&self, path: &Path) -> Result<Option<ExtractedText>> {
        let Some(kind) = MediaKind::classify(path) else {
            return Ok(None);
        };

        let text = match kind {
            MediaKind::Image => self.ocr(path).await?,
            MediaKind::Audio => self.transcribe(path).await?,
            MediaKind::Text => tokio::fs::read_to_string(path).await?.trim().to_string(),
        };

        Ok(Some(ExtractedText {
            text,
            source_type: kind.source_type(),
        }))
    }

    /// OCR an image file via Gemini vision.
    pub async fn ocr(&self, path: &Path) -> Result<String> {
        info!("Extracting text from image: {}", path.display());
        let bytes = tokio::fs::read(path).await?;
        let mime = mime_for_image(path);
        self.gemini.extract_image_text(&bytes, mime).await
    }

    /// Transcribe an audio file via Whisper.
    pub async fn transcribe(&self, path: &Path) -> Result<String> {
        info!("Transcribing audio: {}", path.display());
        self.whisper.transcribe(path, &self.voice_language).await
    }
}

fn mime_for_image(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        _ => "image/jpeg",
    }
}
